use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::spec::form::FormSchema;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stored forms are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Backing storage for the list of form schemas.
pub trait FormStore {
    fn load_all(&self) -> Result<Vec<FormSchema>, StoreError>;
    fn save_all(&mut self, schemas: &[FormSchema]) -> Result<(), StoreError>;
}

/// Keeps schemas in memory; used by tests and previews.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    schemas: Vec<FormSchema>,
}

impl MemoryStore {
    pub fn new(schemas: Vec<FormSchema>) -> Self {
        Self { schemas }
    }
}

impl FormStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<FormSchema>, StoreError> {
        Ok(self.schemas.clone())
    }

    fn save_all(&mut self, schemas: &[FormSchema]) -> Result<(), StoreError> {
        self.schemas = schemas.to_vec();
        Ok(())
    }
}

/// Stores all schemas as one JSON array in a file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl FormStore for JsonFileStore {
    fn load_all(&self) -> Result<Vec<FormSchema>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.io_error(err)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_all(&mut self, schemas: &[FormSchema]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let json = serde_json::to_string_pretty(schemas)?;
        fs::write(&self.path, json).map_err(|err| self.io_error(err))?;
        tracing::debug!(path = %self.path.display(), count = schemas.len(), "saved forms");
        Ok(())
    }
}

/// The loaded list of schemas; every change is written back through the
/// store.
#[derive(Debug)]
pub struct FormLibrary<S: FormStore> {
    store: S,
    forms: Vec<FormSchema>,
}

impl<S: FormStore> FormLibrary<S> {
    pub fn load(store: S) -> Result<Self, StoreError> {
        let forms = store.load_all()?;
        tracing::debug!(count = forms.len(), "loaded forms");
        Ok(Self { store, forms })
    }

    pub fn forms(&self) -> &[FormSchema] {
        &self.forms
    }

    pub fn get(&self, id: &str) -> Option<&FormSchema> {
        self.forms.iter().find(|form| form.id == id)
    }

    pub fn add_form(&mut self, schema: FormSchema) -> Result<(), StoreError> {
        let mut staged = self.forms.clone();
        staged.push(schema);
        self.commit(staged)
    }

    /// Replace the form with the same id. Returns `false` if there is none.
    pub fn update_form(&mut self, schema: FormSchema) -> Result<bool, StoreError> {
        let Some(index) = self.forms.iter().position(|form| form.id == schema.id) else {
            return Ok(false);
        };
        let mut staged = self.forms.clone();
        staged[index] = schema;
        self.commit(staged)?;
        Ok(true)
    }

    /// Replace a form with the same id or append a new one.
    pub fn upsert_form(&mut self, schema: FormSchema) -> Result<(), StoreError> {
        if self.get(&schema.id).is_some() {
            self.update_form(schema).map(|_| ())
        } else {
            self.add_form(schema)
        }
    }

    pub fn delete_form(&mut self, id: &str) -> Result<bool, StoreError> {
        let staged: Vec<FormSchema> = self
            .forms
            .iter()
            .filter(|form| form.id != id)
            .cloned()
            .collect();
        if staged.len() == self.forms.len() {
            return Ok(false);
        }
        self.commit(staged)?;
        Ok(true)
    }

    /// Save `staged` and adopt it; on failure the loaded list is unchanged.
    fn commit(&mut self, staged: Vec<FormSchema>) -> Result<(), StoreError> {
        self.store.save_all(&staged)?;
        self.forms = staged;
        Ok(())
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_library_applies_changes() {
        let mut library = FormLibrary::load(MemoryStore::default()).unwrap();
        let mut schema = FormSchema::new("Signup");
        let id = schema.id.clone();
        library.add_form(schema.clone()).unwrap();

        schema.title = "Sign up".into();
        assert!(library.update_form(schema).unwrap());
        assert_eq!(library.get(&id).map(|form| form.title.as_str()), Some("Sign up"));

        assert!(library.delete_form(&id).unwrap());
        assert!(!library.delete_form(&id).unwrap());
        assert!(library.into_store().load_all().unwrap().is_empty());
    }

    /// Accepts the first `remaining` saves, then fails.
    #[derive(Default)]
    struct FlakyStore {
        saved: Vec<FormSchema>,
        remaining: usize,
    }

    impl FormStore for FlakyStore {
        fn load_all(&self) -> Result<Vec<FormSchema>, StoreError> {
            Ok(self.saved.clone())
        }

        fn save_all(&mut self, schemas: &[FormSchema]) -> Result<(), StoreError> {
            if self.remaining == 0 {
                return Err(StoreError::Io {
                    path: PathBuf::from("flaky.json"),
                    source: io::Error::other("disk full"),
                });
            }
            self.remaining -= 1;
            self.saved = schemas.to_vec();
            Ok(())
        }
    }

    #[test]
    fn failed_save_leaves_the_loaded_list_untouched() {
        let store = FlakyStore {
            remaining: 1,
            ..FlakyStore::default()
        };
        let mut library = FormLibrary::load(store).unwrap();
        let mut schema = FormSchema::new("Signup");
        library.add_form(schema.clone()).unwrap();

        assert!(library.add_form(FormSchema::new("Survey")).is_err());
        assert_eq!(library.forms(), std::slice::from_ref(&schema));

        let original = schema.clone();
        schema.title = "Renamed".into();
        assert!(library.update_form(schema).is_err());
        assert_eq!(library.forms(), std::slice::from_ref(&original));

        assert!(library.delete_form(&original.id).is_err());
        assert_eq!(library.forms(), std::slice::from_ref(&original));
        assert_eq!(library.into_store().saved, vec![original]);
    }

    #[test]
    fn json_file_store_round_trips_and_tolerates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("forms.json");
        let mut store = JsonFileStore::new(&path);
        assert!(store.load_all().unwrap().is_empty());

        let mut schema = FormSchema::new("Survey");
        schema.add_field();
        store.save_all(std::slice::from_ref(&schema)).unwrap();

        let loaded = JsonFileStore::new(&path).load_all().unwrap();
        assert_eq!(loaded, vec![schema]);
    }

    #[test]
    fn corrupt_file_is_a_json_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forms.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileStore::new(&path).load_all(),
            Err(StoreError::Json(_))
        ));
    }
}
