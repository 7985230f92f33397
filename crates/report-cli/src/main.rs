mod wizard;

use clap::{Parser, Subcommand, ValueEnum};
use report_client::{
    ClientConfig, FormBackend, HttpBackend, LoadOutcome, SubmissionController, SubmitOutcome,
};
use report_spec::validate::is_number;
use report_spec::{
    Control, FieldValue, FileHandle, FormSchema, FormSession, RenderPayload, Session,
    SubmissionState, ValidationErrors, render_json_ui, render_receipt, render_text, validate,
};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use wizard::{
    AnswerParseError, ImageCommand, PromptContext, Verbosity, WizardPresenter,
    parse_image_command, parse_selection,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Fill and submit citizen report forms",
    long_about = "Renders report forms, validates answers offline and submits reports to the citizen portal backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// JSON client configuration (base URL, timeout, user agent).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Backend base URL; overrides the config file and REPORT_PORTAL_URL.
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,
    /// Session file holding the signed-in citizen and their token.
    #[arg(long, global = true, value_name = "FILE")]
    session: Option<PathBuf>,
    /// Show statuses, parse expectations and info-level logs.
    #[arg(long, global = true, alias = "debug")]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Render a form's controls.
    Show {
        /// Local form schema JSON.
        #[arg(
            long,
            value_name = "SPEC",
            conflicts_with = "form",
            required_unless_present = "form"
        )]
        spec: Option<PathBuf>,
        /// Form id to fetch from the backend.
        #[arg(long, value_name = "ID")]
        form: Option<String>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Validate an answers file against a form schema without submitting.
    Validate {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Answers JSON; image entries are paths relative to this file.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Fill a form fetched from the backend and submit it.
    Fill {
        #[arg(long, value_name = "ID")]
        form: String,
        /// Answers JSON used instead of interactive prompts.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Print the JSON Schema describing form schema documents.
    Schema,
    /// Forget the signed-in citizen.
    Logout,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match &cli.command {
        Command::Show { spec, form, format } => {
            run_show(&cli, spec.as_deref(), form.as_deref(), *format).await
        }
        Command::Validate { spec, answers } => run_validate(spec, answers),
        Command::Fill { form, answers } => run_fill(&cli, form, answers.as_deref()).await,
        Command::Schema => run_schema(),
        Command::Logout => run_logout(&cli),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn client_config(cli: &Cli) -> CliResult<ClientConfig> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    Ok(config)
}

fn load_session(cli: &Cli) -> CliResult<Option<Session>> {
    let Some(path) = &cli.session else {
        return Ok(None);
    };
    let session = Session::load(path)?;
    match &session {
        Some(session) => info!(user = %session.user_id, "using saved session"),
        None => debug!(path = %path.display(), "no saved session; continuing anonymously"),
    }
    Ok(session)
}

fn http_backend(cli: &Cli) -> CliResult<HttpBackend> {
    let config = client_config(cli)?;
    let session = load_session(cli)?;
    Ok(HttpBackend::new(&config, session.as_ref())?)
}

fn read_schema(path: &Path) -> CliResult<FormSchema> {
    let contents = fs::read_to_string(path)?;
    Ok(FormSchema::from_json_str(&contents)?)
}

async fn run_show(
    cli: &Cli,
    spec: Option<&Path>,
    form: Option<&str>,
    format: RenderMode,
) -> CliResult<()> {
    let schema = match (spec, form) {
        (Some(path), _) => read_schema(path)?,
        (None, Some(form_id)) => http_backend(cli)?.fetch_schema(form_id).await?,
        (None, None) => return Err("either --spec or --form is required".into()),
    };
    let session = FormSession::new(schema)?;
    print_render_output(format, &session.render())
}

fn print_render_output(mode: RenderMode, payload: &RenderPayload) -> CliResult<()> {
    match mode {
        RenderMode::Text => println!("{}", render_text(payload)),
        RenderMode::Json => {
            let ui = render_json_ui(payload);
            println!("{}", serde_json::to_string_pretty(&ui)?);
        }
    }
    Ok(())
}

fn run_validate(spec_path: &Path, answers_path: &Path) -> CliResult<()> {
    let schema = read_schema(spec_path)?;
    let state = read_answers(&schema, answers_path)?;

    let errors = validate(&schema, &state);
    println!(
        "Validation result: {}",
        if errors.is_empty() { "valid" } else { "invalid" }
    );
    describe_validation(&errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn read_answers(schema: &FormSchema, answers_path: &Path) -> CliResult<SubmissionState> {
    let answers_json = fs::read_to_string(answers_path)?;
    let answers: Value = serde_json::from_str(&answers_json)?;
    let base_dir = answers_path.parent().unwrap_or(Path::new("."));
    let state = SubmissionState::from_answers(schema, &answers, |reference| {
        FileHandle::from_path(&base_dir.join(reference))
    })?;
    Ok(state)
}

fn describe_validation(errors: &ValidationErrors) {
    if errors.is_empty() {
        return;
    }
    println!("Errors:");
    for (field, message) in errors.iter() {
        println!("  {} - {}", field, message);
    }
}

fn run_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(FormSchema);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_logout(cli: &Cli) -> CliResult<()> {
    let path = cli
        .session
        .as_deref()
        .ok_or("logout needs --session FILE")?;
    Session::clear(path)?;
    println!("Signed out.");
    Ok(())
}

async fn run_fill(cli: &Cli, form_id: &str, answers: Option<&Path>) -> CliResult<()> {
    let controller = SubmissionController::new(http_backend(cli)?);
    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(cli.verbose));

    if controller.load_schema(form_id).await == LoadOutcome::Redirected {
        presenter.show_notifications(&controller.drain_notifications());
        return Err(format!("form '{}' is unavailable", form_id).into());
    }

    let interactive = answers.is_none();
    match answers {
        Some(path) => apply_answers(&controller, path)?,
        None => prompt_fields(&controller, &mut presenter, None)?,
    }

    loop {
        let outcome = controller.submit().await;
        presenter.show_notifications(&controller.drain_notifications());
        match outcome {
            SubmitOutcome::Submitted(receipt) => {
                print!("{}", render_receipt(&receipt)?);
                return Ok(());
            }
            SubmitOutcome::Invalid(errors) => {
                presenter.show_validation(&errors);
                if !interactive {
                    return Err("validation failed".into());
                }
                prompt_fields(&controller, &mut presenter, Some(&errors))?;
            }
            SubmitOutcome::Failed => {
                if !interactive || !prompt_confirm("Submit again?", true)? {
                    return Err("submission failed".into());
                }
            }
            SubmitOutcome::Busy => return Err("a submission is already in progress".into()),
            SubmitOutcome::NotReady => return Err("no form is loaded".into()),
        }
    }
}

fn apply_answers<B: FormBackend>(
    controller: &SubmissionController<B>,
    answers_path: &Path,
) -> CliResult<()> {
    let schema = controller.schema().ok_or("no form is loaded")?;
    let state = read_answers(&schema, answers_path)?;
    for (field_id, value) in state.iter() {
        controller.update_field(field_id, value.clone())?;
    }
    Ok(())
}

/// Prompts every field in schema order, or only the ones in `only`.
fn prompt_fields<B: FormBackend>(
    controller: &SubmissionController<B>,
    presenter: &mut WizardPresenter,
    only: Option<&ValidationErrors>,
) -> CliResult<()> {
    let payload = controller.render().ok_or("no form is loaded")?;
    presenter.show_header(&payload);
    presenter.show_status(&payload);

    let field_ids = payload
        .controls
        .iter()
        .map(|control| control.field().id.clone())
        .filter(|id| only.is_none_or(|errors| errors.get(id).is_some()))
        .collect::<Vec<_>>();
    let total = field_ids.len();
    for (index, field_id) in field_ids.iter().enumerate() {
        let control = current_control(controller, field_id)?;
        let prompt = PromptContext::new(&control, index + 1, total);
        presenter.show_prompt(&prompt);
        match control {
            Control::TextInput { value, .. } => {
                prompt_text(controller, presenter, field_id, &value, false)?
            }
            Control::NumberInput { value, .. } => {
                prompt_text(controller, presenter, field_id, &value, true)?
            }
            Control::CheckboxGroup { .. } => prompt_choices(controller, presenter, field_id)?,
            Control::FilePicker { .. } => prompt_images(controller, presenter, field_id)?,
        }
    }
    Ok(())
}

fn current_control<B: FormBackend>(
    controller: &SubmissionController<B>,
    field_id: &str,
) -> CliResult<Control> {
    let control = controller
        .render()
        .and_then(|payload| {
            payload
                .controls
                .into_iter()
                .find(|control| control.field().id == field_id)
        })
        .ok_or_else(|| format!("field '{}' is not on the form", field_id))?;
    Ok(control)
}

fn prompt_text<B: FormBackend>(
    controller: &SubmissionController<B>,
    presenter: &WizardPresenter,
    field_id: &str,
    current: &str,
    numeric: bool,
) -> CliResult<()> {
    loop {
        let raw = read_answer()?;
        if raw.is_empty() && !current.is_empty() {
            return Ok(());
        }
        if numeric && !raw.is_empty() && !is_number(&raw) {
            presenter.show_parse_error(&AnswerParseError::new(
                format!("'{}' is not a number.", raw),
                Some("digits with an optional sign and decimal point, e.g. 4 or 2.5".into()),
            ));
            continue;
        }
        controller.update_field(field_id, FieldValue::text(raw))?;
        return Ok(());
    }
}

fn prompt_choices<B: FormBackend>(
    controller: &SubmissionController<B>,
    presenter: &WizardPresenter,
    field_id: &str,
) -> CliResult<()> {
    loop {
        let Control::CheckboxGroup { options, .. } = current_control(controller, field_id)? else {
            return Ok(());
        };
        let listed = options
            .iter()
            .map(|option| (option.value.clone(), option.checked))
            .collect::<Vec<_>>();
        presenter.show_choices(&listed);

        let raw = read_answer()?;
        if raw.is_empty() {
            return Ok(());
        }
        let names = options
            .into_iter()
            .map(|option| option.value)
            .collect::<Vec<_>>();
        match parse_selection(&names, &raw) {
            Ok(picked) => {
                for option in picked {
                    controller.toggle_option(field_id, &option)?;
                }
            }
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn prompt_images<B: FormBackend>(
    controller: &SubmissionController<B>,
    presenter: &WizardPresenter,
    field_id: &str,
) -> CliResult<()> {
    loop {
        let Control::FilePicker { files, .. } = current_control(controller, field_id)? else {
            return Ok(());
        };
        let names = files
            .iter()
            .map(|file| file.file_name.clone())
            .collect::<Vec<_>>();
        presenter.show_files(&names);

        match parse_image_command(&read_answer()?) {
            Ok(ImageCommand::Done) => return Ok(()),
            Ok(ImageCommand::Attach(path)) => match FileHandle::from_path(Path::new(&path)) {
                Ok(file) => {
                    let preview = controller.attach_image(field_id, file)?;
                    debug!(field = field_id, %preview, "image attached");
                }
                Err(err) => eprintln!("{}", err),
            },
            Ok(ImageCommand::Remove(index)) => {
                if let Err(err) = controller.remove_image(field_id, index) {
                    eprintln!("{}", err);
                }
            }
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn read_answer() -> CliResult<String> {
    print!("> ");
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Err("input closed before the form was finished".into());
    }
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("exit") {
        return Err("form filling aborted by user".into());
    }
    Ok(trimmed.to_string())
}

fn prompt_confirm(prompt: &str, default: bool) -> CliResult<bool> {
    let hint = if default { "Y/n" } else { "y/N" };
    loop {
        print!("{} [{}]: ", prompt, hint);
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("Please answer yes or no."),
        }
    }
}
