use report_client::{Notification, NotificationLevel};
use report_spec::{Control, RenderPayload, RenderStatus, ValidationErrors};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: status, field overview and parse details.
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

/// Prints prompts, errors and notifications while a form is being filled.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            header_printed: false,
        }
    }

    pub fn show_header(&mut self, payload: &RenderPayload) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", payload.form_title);
        if let Some(description) = &payload.description {
            println!("{}", description);
        }
        self.header_printed = true;
    }

    pub fn show_status(&self, payload: &RenderPayload) {
        if !self.verbosity.is_verbose() {
            return;
        }
        println!(
            "Status: {} ({}/{})",
            payload.status.as_str(),
            payload.progress.filled,
            payload.progress.total
        );
        if payload.status == RenderStatus::Invalid {
            let flagged = payload
                .controls
                .iter()
                .map(Control::field)
                .filter(|field| field.error.is_some())
                .map(|field| field.id.as_str())
                .collect::<Vec<_>>();
            println!("Fields to fix: {}", flagged.join(", "));
        }
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
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
        if let Some(error) = &prompt.error {
            println!("  ! {}", error);
        }
    }

    pub fn show_choices(&self, options: &[(String, bool)]) {
        for (index, (option, checked)) in options.iter().enumerate() {
            let mark = if *checked { "x" } else { " " };
            println!("  {}. [{}] {}", index + 1, mark, option);
        }
    }

    pub fn show_files(&self, files: &[String]) {
        if files.is_empty() {
            println!("  (no files attached)");
        }
        for (index, file) in files.iter().enumerate() {
            println!("  {}. {}", index + 1, file);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_validation(&self, errors: &ValidationErrors) {
        eprintln!("Please fix the following before submitting:");
        for (field, message) in errors.iter() {
            eprintln!("  {} - {}", field, message);
        }
    }

    pub fn show_notifications(&self, notifications: &[Notification]) {
        for notification in notifications {
            match notification.level {
                NotificationLevel::Error => eprintln!("Error: {}", notification.message),
                NotificationLevel::Success => println!("{}", notification.message),
                NotificationLevel::Info => {
                    if self.verbosity.is_verbose() {
                        println!("{}", notification.message);
                    }
                }
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub error: Option<String>,
}

impl PromptContext {
    pub fn new(control: &Control, index: usize, total: usize) -> Self {
        let field = control.field();
        let hint = match control {
            Control::TextInput { value, .. } => current_hint(value),
            Control::NumberInput { value, .. } => {
                current_hint(value).or_else(|| Some("(number)".to_string()))
            }
            Control::CheckboxGroup { .. } => {
                Some("(numbers or names to toggle, blank when done)".to_string())
            }
            Control::FilePicker { .. } => {
                Some("(path to attach, rm N to remove, blank when done)".to_string())
            }
        };
        Self {
            index: index.max(1),
            total,
            label: field.label.clone(),
            description: field.description.clone(),
            required: field.required,
            hint,
            error: field.error.clone(),
        }
    }
}

fn current_hint(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(format!("[{}]", value))
    }
}

/// Error produced when parsing input from the user.
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

/// Resolves `1,3` or `fire, flood` into option names.
pub fn parse_selection(options: &[String], raw: &str) -> Result<Vec<String>, AnswerParseError> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            if let Ok(position) = token.parse::<usize>() {
                return options
                    .get(position.wrapping_sub(1))
                    .cloned()
                    .ok_or_else(|| {
                        AnswerParseError::new(
                            format!("There is no option number {}.", position),
                            Some(format!("1 to {}", options.len())),
                        )
                    });
            }
            options
                .iter()
                .find(|option| option.eq_ignore_ascii_case(token))
                .cloned()
                .ok_or_else(|| {
                    AnswerParseError::new(
                        format!("'{}' is not one of the options.", token),
                        Some(format!("allowed values: {}", options.join(", "))),
                    )
                })
        })
        .collect()
}

/// One edit to an image field.
#[derive(Debug, PartialEq, Eq)]
pub enum ImageCommand {
    Done,
    Attach(String),
    /// Zero-based index of the file to detach.
    Remove(usize),
}

pub fn parse_image_command(raw: &str) -> Result<ImageCommand, AnswerParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(ImageCommand::Done);
    }
    if let Some(position) = trimmed.strip_prefix("rm ") {
        return match position.trim().parse::<usize>() {
            Ok(position) if position >= 1 => Ok(ImageCommand::Remove(position - 1)),
            _ => Err(AnswerParseError::new(
                "Use rm N to remove the N-th attached file.",
                Some("e.g. rm 1".to_string()),
            )),
        };
    }
    Ok(ImageCommand::Attach(trimmed.to_string()))
}
