use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kb_assistant::{
    telemetry, AnswerResult, BackendChoice, QuestionAnsweringPipeline, Session, SettingsArgs,
    SourceLabel, WebResult, EMPTY_QUESTION,
};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(
    name = "kb-assistant",
    about = "Answer questions from the reference and notes collections, falling back to the web"
)]
struct AssistantCli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and print a grounded answer
    Ask {
        /// Question to answer
        #[arg(long)]
        question: String,

        /// Text-generation backend
        #[arg(long, value_enum, default_value_t = BackendChoice::Cloud)]
        backend: BackendChoice,

        /// Print the retrieved payloads and vector-store status
        #[arg(long, default_value_t = false)]
        debug: bool,
    },
    /// Search the web directly and print the results
    Web {
        /// Search query
        #[arg(long)]
        question: String,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = AssistantCli::parse();
    telemetry::init_tracing(cli.verbose, cli.log_json);
    let settings = cli.settings.build_settings();
    let pipeline = QuestionAnsweringPipeline::from_settings(&settings)
        .context("failed to build HTTP clients")?;

    match cli.command {
        Command::Ask {
            question,
            backend,
            debug,
        } => {
            let question = require_question(&question)?;
            let mut session = Session::new();
            let result = pipeline.answer(&mut session, question, backend);
            print!("{}", answer_report(&result));
            if debug {
                print!(
                    "{}",
                    debug_report(session.last_payloads(), settings.qdrant_url.as_deref())?
                );
            }
        }
        Command::Web { question } => {
            let question = require_question(&question)?;
            print!("{}", web_report(&pipeline.web_search(question)));
        }
    }
    Ok(())
}

fn require_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        bail!(EMPTY_QUESTION);
    }
    Ok(trimmed)
}

/// Answer, the provenance list for knowledge-base answers, then the label.
fn answer_report(result: &AnswerResult) -> String {
    let mut out = format!("--- Answer ---\n{}\n\n", result.answer);
    if result.source != SourceLabel::Web && !result.provenance.is_empty() {
        out.push_str("Sources used:\n");
        for name in &result.provenance {
            out.push_str(&format!("- {name}\n"));
        }
    }
    out.push_str(&format!("Source: {}\n", result.source));
    out
}

fn debug_report(payloads: &[Value], qdrant_url: Option<&str>) -> Result<String> {
    let payloads = serde_json::to_string_pretty(payloads).context("failed to render payloads")?;
    let store = match qdrant_url {
        Some(url) => format!("configured ({url})"),
        None => "not configured".to_string(),
    };
    Ok(format!(
        "\n--- Debug ---\nLast payloads: {payloads}\nVector store: {store}\n"
    ))
}

fn web_report(results: &[WebResult]) -> String {
    if results.is_empty() {
        return "Warning: no web results found\n".to_string();
    }
    let mut out = String::from("--- Web search results ---\n");
    for (idx, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "Result {}: {}\n  URL: {}\n  Content: {}\n\n",
            idx + 1,
            result.title.as_deref().unwrap_or("No title"),
            result.link.as_deref().unwrap_or_default(),
            result.snippet.as_deref().unwrap_or("No description"),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn result(source: SourceLabel, provenance: &[&str]) -> AnswerResult {
        AnswerResult {
            answer: "Antwort".into(),
            source,
            provenance: provenance.iter().map(|name| name.to_string()).collect(),
        }
    }

    #[test]
    fn blank_questions_are_rejected() {
        let err = require_question(" \t ").expect_err("blank");
        assert_eq!(err.to_string(), "Please enter a question!");
        assert_eq!(require_question("  What is TLS? ").expect("question"), "What is TLS?");
    }

    #[test]
    fn knowledge_base_answers_list_their_sources() {
        let report = answer_report(&result(SourceLabel::Notes, &["firewall.md", "vpn.md"]));
        assert_eq!(
            report,
            "--- Answer ---\nAntwort\n\nSources used:\n- firewall.md\n- vpn.md\nSource: Notes\n"
        );
    }

    #[test]
    fn web_answers_hide_the_sources_list() {
        let report = answer_report(&result(SourceLabel::Web, &["ignored"]));
        assert!(!report.contains("Sources used:"));
        assert!(report.ends_with("Source: Web\n"));

        let report = answer_report(&result(SourceLabel::References, &[]));
        assert!(!report.contains("Sources used:"));
    }

    #[test]
    fn debug_report_shows_payloads_and_store_status() {
        let report = debug_report(&[json!({ "content": "x" })], Some("http://qdrant:6333/"))
            .expect("report");
        assert!(report.contains("\"content\": \"x\""));
        assert!(report.ends_with("Vector store: configured (http://qdrant:6333/)\n"));

        let report = debug_report(&[], None).expect("report");
        assert!(report.contains("Last payloads: []"));
        assert!(report.ends_with("Vector store: not configured\n"));
    }

    #[test]
    fn web_report_uses_placeholders_and_warns_when_empty() {
        assert_eq!(web_report(&[]), "Warning: no web results found\n");

        let report = web_report(&[
            WebResult {
                title: Some("RFC 8446".into()),
                link: Some("https://rfc-editor.org/rfc/rfc8446".into()),
                snippet: Some("TLS 1.3".into()),
            },
            WebResult::default(),
        ]);
        assert!(report.starts_with("--- Web search results ---\nResult 1: RFC 8446\n"));
        assert!(report.contains("Result 2: No title\n  URL: \n  Content: No description\n"));
    }
}
