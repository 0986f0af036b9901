//! Command surface dispatch
//!
//! Translates the short textual commands forwarded by a chat front-end into
//! engine calls and renders plain-text replies. Arguments after the
//! subcommand are pipe-delimited (`stage Acme Corp | Proposal Sent`), which
//! keeps organization names with spaces unambiguous. Chat-platform plumbing
//! (signature verification, event routing) lives outside this crate.

use crate::engine::{MutationOutcome, NewOrganization, PipelineEngine};
use donorbase_common::db::DonorRecord;
use donorbase_common::Error;

/// A parsed pipeline command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status { org: String },
    Search { query: String },
    Stage { org: String, stage: String },
    Assign { org: String, owner: String },
    NextAction { org: String, action: String, date: String },
    Notes { org: String, text: String },
    Add { org: String, stage: Option<String> },
    Summary,
    Help,
}

impl Command {
    /// Parse command text: a subcommand word, then pipe-delimited arguments
    pub fn parse(text: &str) -> Result<Command, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Command::Help);
        }

        let (verb, rest) = match text.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (text, ""),
        };

        let parts: Vec<String> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('|').map(|p| p.trim().to_string()).collect()
        };

        match verb.to_lowercase().as_str() {
            "status" => match parts.as_slice() {
                [org] if !org.is_empty() => Ok(Command::Status { org: org.clone() }),
                _ => Err("Usage: status [Organization]".to_string()),
            },
            "search" => match parts.as_slice() {
                [query] if !query.is_empty() => Ok(Command::Search { query: query.clone() }),
                _ => Err("Usage: search [query]".to_string()),
            },
            "stage" => match parts.as_slice() {
                [org, stage] if !org.is_empty() && !stage.is_empty() => Ok(Command::Stage {
                    org: org.clone(),
                    stage: stage.clone(),
                }),
                _ => Err("Usage: stage [Organization] | [Stage]".to_string()),
            },
            "assign" => match parts.as_slice() {
                [org, owner] if !org.is_empty() && !owner.is_empty() => Ok(Command::Assign {
                    org: org.clone(),
                    owner: owner.clone(),
                }),
                _ => Err("Usage: assign [Organization] | [Member]".to_string()),
            },
            "next" => match parts.as_slice() {
                [org, action, date] if !org.is_empty() => Ok(Command::NextAction {
                    org: org.clone(),
                    action: action.clone(),
                    date: date.clone(),
                }),
                _ => Err("Usage: next [Organization] | [Action] | [YYYY-MM-DD]".to_string()),
            },
            "notes" => match parts.as_slice() {
                [org, text] if !org.is_empty() && !text.is_empty() => Ok(Command::Notes {
                    org: org.clone(),
                    text: text.clone(),
                }),
                _ => Err("Usage: notes [Organization] | [Note text]".to_string()),
            },
            "add" => match parts.as_slice() {
                [org] if !org.is_empty() => Ok(Command::Add {
                    org: org.clone(),
                    stage: None,
                }),
                [org, stage] if !org.is_empty() => Ok(Command::Add {
                    org: org.clone(),
                    stage: Some(stage.clone()),
                }),
                _ => Err("Usage: add [Organization] | [Stage (optional)]".to_string()),
            },
            "summary" => Ok(Command::Summary),
            "help" => Ok(Command::Help),
            other => Err(format!(
                "Unknown command '{}'. Try `help` for the command list.",
                other
            )),
        }
    }
}

/// Execute a command and render a short text reply.
///
/// Errors come back as replies too; the chat front-end never needs to
/// handle engine error types.
pub async fn dispatch(engine: &PipelineEngine, text: &str, actor: &str) -> String {
    let command = match Command::parse(text) {
        Ok(command) => command,
        Err(usage) => return usage,
    };

    match command {
        Command::Help => help_text().to_string(),
        Command::Status { org } => match engine.get_status(&org).await {
            Ok(record) => render_status(&record),
            Err(e) => render_error(&e),
        },
        Command::Search { query } => match engine.search_organizations(&query).await {
            Ok(hits) if hits.is_empty() => {
                format!("No organizations matching '{}'.", query)
            }
            Ok(hits) => {
                let mut reply = format!("Found {} match(es) for '{}':", hits.len(), query);
                for hit in hits.iter().take(10) {
                    reply.push_str(&format!(
                        "\n• {} - {}",
                        hit.record.organization_name, hit.record.current_stage
                    ));
                }
                reply
            }
            Err(e) => render_error(&e),
        },
        Command::Stage { org, stage } => {
            match engine.transition_stage(&org, &stage, actor, None).await {
                Ok(outcome) => with_warning(
                    format!(
                        "{} moved to {} (was {}).",
                        outcome.record.organization_name,
                        outcome.record.current_stage,
                        outcome
                            .record
                            .previous_stage
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "unset".to_string()),
                    ),
                    &outcome,
                ),
                Err(e) => render_error(&e),
            }
        }
        Command::Assign { org, owner } => {
            match engine.assign_owner(&org, &owner, actor, None).await {
                Ok(outcome) => with_warning(
                    format!("{} assigned to {}.", outcome.record.organization_name, owner),
                    &outcome,
                ),
                Err(e) => render_error(&e),
            }
        }
        Command::NextAction { org, action, date } => {
            match engine.set_next_action(&org, &action, &date, actor, None).await {
                Ok(outcome) => with_warning(
                    format!(
                        "Next action for {}: {} (due {}).",
                        outcome.record.organization_name, action, date
                    ),
                    &outcome,
                ),
                Err(e) => render_error(&e),
            }
        }
        Command::Notes { org, text } => {
            // Chat notes are additive: read the current text and concatenate.
            // The engine itself has replace semantics.
            let existing = match engine.find_organization(&org).await {
                Ok(record) => record,
                Err(e) => return render_error(&e),
            };
            let combined = match &existing.notes {
                Some(notes) => format!("{}\n{}", notes, text),
                None => text.clone(),
            };
            match engine
                .update_notes(
                    &existing.organization_name,
                    &combined,
                    actor,
                    Some(existing.last_updated.as_str()),
                )
                .await
            {
                Ok(outcome) => with_warning(
                    format!("Note added to {}.", outcome.record.organization_name),
                    &outcome,
                ),
                Err(e) => render_error(&e),
            }
        }
        Command::Add { org, stage } => {
            let new = NewOrganization {
                name: org,
                stage,
                ..Default::default()
            };
            match engine.add_organization(new, actor).await {
                Ok(record) => format!(
                    "Added {} at {}.",
                    record.organization_name, record.current_stage
                ),
                Err(e) => render_error(&e),
            }
        }
        Command::Summary => match engine.pipeline_summary().await {
            Ok(summary) => {
                let mut reply = format!(
                    "Pipeline: {} organization(s).",
                    summary.total_organizations
                );
                for entry in summary.stage_breakdown.iter().filter(|e| e.count > 0) {
                    reply.push_str(&format!("\n• {}: {}", entry.stage, entry.count));
                }
                if !summary.active_prospects.is_empty() {
                    reply.push_str("\nActive prospects:");
                    for prospect in &summary.active_prospects {
                        reply.push_str(&format!(
                            "\n• {} ({})",
                            prospect.organization_name, prospect.stage
                        ));
                    }
                }
                reply
            }
            Err(e) => render_error(&e),
        },
    }
}

fn render_status(record: &DonorRecord) -> String {
    let mut reply = format!(
        "{} - {}",
        record.organization_name, record.current_stage
    );
    if let Some(previous) = record.previous_stage {
        reply.push_str(&format!(" (previously {})", previous));
    }
    if let Some(contact) = &record.contact_person {
        reply.push_str(&format!("\nContact: {}", contact));
        if let Some(email) = &record.contact_email {
            reply.push_str(&format!(" <{}>", email));
        }
    }
    if let Some(owner) = &record.assigned_to {
        reply.push_str(&format!("\nAssigned to: {}", owner));
    }
    match (&record.next_action, record.next_action_date) {
        (Some(action), Some(date)) => {
            reply.push_str(&format!("\nNext action: {} (due {})", action, date));
        }
        (Some(action), None) => reply.push_str(&format!("\nNext action: {}", action)),
        _ => {}
    }
    if let Some(notes) = &record.notes {
        let line = notes.lines().last().unwrap_or_default();
        if !line.is_empty() {
            reply.push_str(&format!("\nLatest note: {}", line));
        }
    }
    reply
}

/// Render engine errors the way a chat user expects: a pick-list for
/// ambiguity, a search hint for not-found, one line otherwise.
fn render_error(error: &Error) -> String {
    match error {
        Error::AmbiguousMatch { query, candidates } => {
            let mut reply = format!(
                "'{}' matches {} organizations - which did you mean?",
                query,
                candidates.len()
            );
            for (i, name) in candidates.iter().enumerate() {
                reply.push_str(&format!("\n{}. {}", i + 1, name));
            }
            reply
        }
        Error::NotFound(query) => format!(
            "No organization found matching '{}'. Try `search {}` to look for partial matches.",
            query, query
        ),
        Error::ConcurrentModification(org) => format!(
            "'{}' was changed by someone else just now - please re-check and retry.",
            org
        ),
        other => other.to_string(),
    }
}

fn with_warning(reply: String, outcome: &MutationOutcome) -> String {
    match outcome.audit.warning() {
        Some(warning) => format!("{}\n⚠ {}", reply, warning),
        None => reply,
    }
}

fn help_text() -> &'static str {
    "Pipeline commands:\n\
     • status [Org] - organization status\n\
     • search [query] - find organizations\n\
     • stage [Org] | [Stage] - update stage\n\
     • assign [Org] | [Member] - assign an owner\n\
     • next [Org] | [Action] | [YYYY-MM-DD] - set next action\n\
     • notes [Org] | [Text] - add a note\n\
     • add [Org] | [Stage (optional)] - add an organization\n\
     • summary - pipeline overview"
}
