use form_spec::{
    Control, EditOutcome, FieldValue, FormValues, RenderField, RenderPayload, ValidationResult,
};

/// Controls which bits of state the fill-in session prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: derived values after each edit, rule diagnostics.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and results for an interactive fill-in.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_values_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_values_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_values_json,
        }
    }

    pub fn show_header(&mut self, payload: &RenderPayload) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", payload.form_title);
        if self.verbosity.is_verbose() {
            println!("Fields: {}", payload.fields.len());
        }
        self.header_printed = true;
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = format!("{}/{} {}", prompt.index, prompt.total, prompt.label);
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if let Some(current) = &prompt.current {
            println!("Current: {} (press enter to keep)", current);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_edit(&self, outcome: &EditOutcome, values: &FormValues) {
        if let Some(error) = &outcome.error {
            eprintln!("  ! {}", error);
        }
        if let Some(rule_error) = &outcome.rule_error {
            eprintln!("  ! rule cannot be applied: {}", rule_error);
        }
        if self.verbosity.is_verbose() {
            for id in &outcome.derived_changed {
                println!("  ~ {} = {}", id, values.raw_text(id));
            }
            for failure in &outcome.derivation_failures {
                eprintln!("  ~ {} not updated: {}", failure.field_id, failure.error);
            }
        }
    }

    pub fn show_rejected(&self, result: &ValidationResult) {
        eprintln!("Form is not valid yet:");
        for (field_id, message) in &result.errors {
            eprintln!("  {} - {}", field_id, message);
        }
        for (field_id, error) in &result.rule_errors {
            eprintln!("  {} - {}", field_id, error);
        }
    }

    pub fn show_completion(&self, values: &FormValues) {
        println!("Done ✅");
        if self.show_values_json {
            match serde_json::to_string_pretty(values) {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize values to JSON: {}", err),
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub label: String,
    pub required: bool,
    pub hint: Option<String>,
    pub current: Option<String>,
}

impl PromptContext {
    pub fn new(field: &RenderField, index: usize, total: usize) -> Self {
        let current = match &field.value {
            FieldValue::Text(text) if !text.is_empty() => Some(text.clone()),
            FieldValue::Bool(flag) => Some(if *flag { "yes" } else { "no" }.to_string()),
            _ => None,
        };
        Self {
            index,
            total,
            label: field.label.clone(),
            required: field.required,
            hint: hint_for(field),
            current,
        }
    }
}

fn hint_for(field: &RenderField) -> Option<String> {
    match &field.control {
        Control::Toggle => Some("(yes/no, y/n, true/false)".to_string()),
        Control::Choice { options, .. } if !options.is_empty() => {
            Some(format!("({})", options.join("/")))
        }
        Control::Input { input_type } if *input_type != "text" => {
            Some(format!("({})", input_type))
        }
        _ => field.placeholder.as_ref().map(|placeholder| format!("e.g. {}", placeholder)),
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Turn a line of input into a value for `field`. `None` keeps the current
/// value.
pub fn parse_answer(field: &RenderField, input: &str) -> Result<Option<FieldValue>, AnswerParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match &field.control {
        Control::Toggle => match trimmed.to_lowercase().as_str() {
            "y" | "yes" | "true" => Ok(Some(FieldValue::Bool(true))),
            "n" | "no" | "false" => Ok(Some(FieldValue::Bool(false))),
            other => Err(AnswerParseError::new(
                format!("'{}' is not yes or no", other),
                Some("yes/no, y/n, true/false".to_string()),
            )),
        },
        Control::Choice { options, .. } => {
            if let Some(option) = options.iter().find(|option| option.as_str() == trimmed) {
                return Ok(Some(FieldValue::text(option.as_str())));
            }
            // Options may also be picked by their 1-based position.
            match trimmed.parse::<usize>() {
                Ok(position) if (1..=options.len()).contains(&position) => {
                    Ok(Some(FieldValue::text(options[position - 1].as_str())))
                }
                _ => Err(AnswerParseError::new(
                    format!("'{}' is not one of the options", trimmed),
                    Some(options.join(", ")),
                )),
            }
        }
        _ => Ok(Some(FieldValue::text(trimmed))),
    }
}
