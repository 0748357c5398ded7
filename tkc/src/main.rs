use clap::{Args, Parser, ValueEnum};
use instoken::{EncodingResolver, EncodingType};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::exit;
use tokcount::completion::{CompletionConfig, CompletionPreset, CompletionRequest};
use tokcount::{InputSource, RunConfig, SpecialTokens};
use tracing::*;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

/// Count the tokens a model sees in some text.
///
/// With no text, a couple of built-in samples are counted.  `file:<path>` counts each non-blank
/// line of a file as its own entry.  Everything after the options is text, even words starting
/// with `-`; use `--` before text that is exactly one of the options.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(flatten)]
    mode: Mode,

    /// The text to count, or `file:<path>` to count each line of a file
    #[arg(allow_hyphen_values = true, trailing_var_arg = true)]
    text: Vec<String>,
}

#[derive(Args)]
struct Globals {
    /// Name of the model the text is for, which determines the encoding.
    ///
    /// If not specified, or not a known model, the cl100k_base encoding is used.
    #[arg(short, long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Directory of `<encoding>.tiktoken` files to use instead of the built-in vocabularies
    #[arg(long, value_name = "DIR", env = "INSTOKEN_VOCAB_DIR")]
    vocab_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,
}

impl Globals {
    /// The model hint, if there is a non-blank one
    fn model_hint(&self) -> Option<&str> {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
    }
}

/// Options that do something other than count the text
#[derive(Args)]
struct Mode {
    /// Count text like `<|endoftext|>` as the special token rather than as ordinary text
    #[arg(long)]
    allow_special: bool,

    /// List the supported encodings instead of counting.  Any text names the encodings to list.
    #[arg(long, conflicts_with_all = ["allow_special", "completion_config"])]
    list_encodings: bool,

    /// Show the completion request settings the environment produces for PRESET, and the encoding
    /// that goes with them, instead of counting.  Any text is a prompt to count with that encoding.
    #[arg(long, value_name = "PRESET", conflicts_with = "allow_special")]
    completion_config: Option<CompletionPreset>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn list_encodings(
    globals: &Globals,
    resolver: &EncodingResolver,
    names: &[String],
) -> anyhow::Result<()> {
    let types = if names.is_empty() {
        EncodingType::all().collect()
    } else {
        names
            .iter()
            .map(|name| EncodingType::from_name(name))
            .collect::<instoken::Result<Vec<_>>>()?
    };
    let encodings: Vec<_> = types.into_iter().map(|typ| resolver.encoding(typ)).collect();

    match globals.format {
        OutputFormat::Text => {
            for encoding in &encodings {
                let mut specials: Vec<_> = encoding.special_tokens().collect();
                specials.sort_by_key(|(_, rank)| *rank);

                println!(
                    "{:<12} vocab_size={:<7} source={}",
                    encoding.name(),
                    encoding.vocab_size(),
                    encoding.rank_source()
                );
                for (token, rank) in specials {
                    println!("    {rank:>6}  {}", String::from_utf8_lossy(token));
                }
            }
        }
        OutputFormat::Json => {
            let encodings: Vec<_> = encodings
                .iter()
                .map(|encoding| {
                    serde_json::json!({
                        "name": encoding.name(),
                        "vocab_size": encoding.vocab_size(),
                        "source": encoding.rank_source().to_string(),
                        "special_tokens": encoding
                            .special_tokens()
                            .map(|(token, rank)| {
                                (String::from_utf8_lossy(token).into_owned(), rank)
                            })
                            .collect::<BTreeMap<_, _>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&encodings)?);
        }
    }

    Ok(())
}

fn show_completion_config(
    globals: &Globals,
    resolver: &EncodingResolver,
    preset: CompletionPreset,
    prompt: Option<String>,
) -> anyhow::Result<()> {
    let mut config = CompletionConfig::from_env(preset);
    if let Some(model) = globals.model_hint() {
        config.model = model.to_string();
    }
    let resolution = resolver.resolve(Some(&config.model));
    let request = prompt.map(|prompt| CompletionRequest::new(prompt, config.clone()));
    let prompt_tokens = request
        .as_ref()
        .map(|request| request.prompt_tokens(resolver));

    match globals.format {
        OutputFormat::Text => {
            println!("Preset: {preset}");
            println!("{config}");
            print!("Encoding: {}", resolution.encoding().name());
            if resolution.is_fallback() {
                print!(" (no encoding is known for this model; using the baseline)");
            }
            println!();
            if let Some(prompt_tokens) = prompt_tokens {
                println!("Prompt tokens: {prompt_tokens}");
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "preset": preset.to_string(),
                "config": config,
                "encoding": resolution.encoding().name(),
                "fell_back": resolution.is_fallback(),
                "prompt_tokens": prompt_tokens,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

fn count(
    globals: &Globals,
    resolver: &EncodingResolver,
    text: &[String],
    allow_special: bool,
) -> anyhow::Result<()> {
    let config = RunConfig {
        source: InputSource::from_args(text),
        model_hint: globals.model_hint().map(String::from),
        special_tokens: if allow_special {
            SpecialTokens::Allowed
        } else {
            SpecialTokens::Ordinary
        },
    };

    let report = tokcount::run(resolver, &config)?;

    match globals.format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => println!("{}", report.render_json()?),
    }

    Ok(())
}

impl Cli {
    fn execute(self) -> anyhow::Result<()> {
        let resolver = EncodingResolver::with_vocab_dir(self.globals.vocab_dir.clone());

        if self.mode.list_encodings {
            list_encodings(&self.globals, &resolver, &self.text)
        } else if let Some(preset) = self.mode.completion_config {
            let prompt = (!self.text.is_empty()).then(|| self.text.join(" "));
            show_completion_config(&self.globals, &resolver, preset, prompt)
        } else {
            count(&self.globals, &resolver, &self.text, self.mode.allow_special)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    // You can see how many times a particular flag or argument occurred
    // Note, only flags can have multiple occurrences
    let default_log_directive = match cli.globals.debug {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // Log events are JSON on stderr, so they never mix with the report on stdout
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_log_directive.into())
                .from_env_lossy(),
        )
        .json()
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    if let Some(vocab_dir) = cli.globals.vocab_dir.as_deref() {
        debug!("Value for vocab_dir: {}", vocab_dir.display());
    }

    if let Err(e) = cli.execute() {
        error!("{:#}", e);
        exit(1);
    } else {
        debug!("command executed successfully");
    }
}
