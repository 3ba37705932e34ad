//! forge – command-line report renderer.
//!
//! Usage:
//!   forge <input.html> [output] [--format pdf|container] [--title "My Report"]
//!         [--landscape] [--context data.json]
//!   forge --document definition.json [output] [--format ...] [--context data.json]
//!   forge --sample Invoice|Handbook [output] [--format ...] [--context params.json]
//!
//! If `output` is omitted the result is written next to the input with the
//! same stem and the extension of the chosen format. Without `--format` the
//! format follows the output extension, defaulting to PDF.

use std::{
    env,
    path::{Path, PathBuf},
    process,
};

use serde_json::Value;

use report_forge::export::DocumentFormat;
use report_forge::templates::sample_registry;
use report_forge::{ContextRegistry, Document, FlowPart, HtmlConverter, PageTemplate, ReportingService};

enum Source {
    Html(PathBuf),
    Definition(PathBuf),
    Sample(String),
}

struct Options {
    source: Source,
    output: Option<PathBuf>,
    format: Option<DocumentFormat>,
    title: Option<String>,
    landscape: bool,
    context: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args);

    let context = match &options.context {
        Some(path) => match read_json(path).await {
            Ok(value) => value,
            Err(e) => fail(&format!("Error reading context '{}': {e}", path.display())),
        },
        None => Value::Null,
    };

    let format = options.format.unwrap_or_else(|| {
        options
            .output
            .as_ref()
            .and_then(|o| DocumentFormat::from_path(o).ok())
            .unwrap_or(DocumentFormat::Pdf)
    });

    let output = options.output.clone().unwrap_or_else(|| {
        let mut o = match &options.source {
            Source::Html(p) | Source::Definition(p) => p.clone(),
            Source::Sample(name) => PathBuf::from(name.to_lowercase()),
        };
        o.set_extension(format.extension());
        o
    });

    let registry = match options.source {
        Source::Sample(_) => sample_registry(),
        _ => ContextRegistry::default(),
    };
    let service = match ReportingService::new(registry) {
        Ok(s) => s,
        Err(e) => fail(&format!("Error starting render worker: {e}")),
    };

    let result = match &options.source {
        Source::Html(input) => {
            let section = match HtmlConverter::convert_file_async(input).await {
                Ok(s) => s,
                Err(e) => fail(&format!("Error reading '{}': {e}", input.display())),
            };
            // Default title: stem of the input filename.
            let title = options.title.clone().unwrap_or_else(|| {
                input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("forge output")
                    .to_string()
            });
            let mut template = PageTemplate::report(title.clone());
            if options.landscape {
                template = template.landscape();
            }
            let document = Document::new(title).with_part(FlowPart::new(template, section));
            service.export_built_document(document, context, format).await
        }
        Source::Definition(path) => {
            let mut buffer = Vec::new();
            service
                .export_definition(path, None, format, &mut buffer, context)
                .await
                .map(|()| buffer)
        }
        Source::Sample(name) => {
            let mut buffer = Vec::new();
            service
                .export_document(name, format, &mut buffer, context)
                .await
                .map(|()| buffer)
        }
    };

    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => fail(&format!("Error rendering report: {}", error_chain(&e))),
    };

    // Create output directory if necessary.
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                fail(&format!("Error creating output directory: {e}"));
            }
        }
    }
    if let Err(e) = tokio::fs::write(&output, &bytes).await {
        fail(&format!("Error writing '{}': {e}", output.display()));
    }
    eprintln!("Wrote '{}' ({} bytes, {:?})", output.display(), bytes.len(), format);
}

fn parse_args(args: &[String]) -> Options {
    let prog = args.first().map(String::as_str).unwrap_or("forge");
    let mut source: Option<Source> = None;
    let mut positional: Vec<PathBuf> = Vec::new();
    let mut format = None;
    let mut title = None;
    let mut landscape = false;
    let mut context = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| match iter.next() {
            Some(v) => v.clone(),
            None => {
                eprintln!("Missing value for {flag}");
                print_usage(prog);
                process::exit(1);
            }
        };
        match arg.as_str() {
            "--landscape" | "-l" => landscape = true,
            "--title" | "-t" => title = Some(value(arg.as_str())),
            "--context" | "-c" => context = Some(PathBuf::from(value(arg.as_str()))),
            "--document" | "-d" => source = Some(Source::Definition(PathBuf::from(value(arg.as_str())))),
            "--sample" => source = Some(Source::Sample(value(arg.as_str()))),
            "--format" | "-f" => {
                format = Some(match value(arg.as_str()).to_ascii_lowercase().as_str() {
                    "pdf" => DocumentFormat::Pdf,
                    "container" | "rfpc" => DocumentFormat::Container,
                    other => {
                        eprintln!("Unknown format: {other}");
                        print_usage(prog);
                        process::exit(1);
                    }
                })
            }
            "--help" | "-h" => {
                print_usage(prog);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(prog);
                process::exit(1);
            }
            path => positional.push(PathBuf::from(path)),
        }
    }

    let mut positional = positional.into_iter();
    let source = match source {
        Some(s) => s,
        None => match positional.next() {
            Some(input) => Source::Html(input),
            None => {
                eprintln!("Error: no input file specified.");
                print_usage(prog);
                process::exit(1);
            }
        },
    };
    let output = positional.next();
    if let Some(extra) = positional.next() {
        eprintln!("Unexpected argument: {}", extra.display());
        print_usage(prog);
        process::exit(1);
    }

    Options {
        source,
        output,
        format,
        title,
        landscape,
        context,
    }
}

async fn read_json(path: &Path) -> Result<Value, String> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| e.to_string())?;
    serde_json::from_str(&text).map_err(|e| e.to_string())
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    process::exit(1);
}

fn print_usage(prog: &str) {
    eprintln!("forge – report renderer (report-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input.html> [output] [--format pdf|container] [--title \"My Report\"] [--landscape] [--context data.json]");
    eprintln!("  {prog} --document definition.json [output] [--format pdf|container] [--context data.json]");
    eprintln!("  {prog} --sample Invoice|Handbook [output] [--format pdf|container] [--context params.json]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <input.html>   HTML file to convert; {{Path}} placeholders bind against the context");
    eprintln!("  [output]       Output path (default: input stem with the format's extension)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --format, -f   pdf (default) or container (.rfpc page container)");
    eprintln!("  --title, -t    Document title (default: input filename stem)");
    eprintln!("  --landscape    Use landscape page orientation (A4 841x595 pt)");
    eprintln!("  --context, -c  JSON file used as data context or context parameters");
    eprintln!("  --document, -d Render a JSON document definition");
    eprintln!("  --sample       Render one of the built-in sample documents");
    eprintln!("  --help         Print this message");
}
