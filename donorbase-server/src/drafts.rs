//! Email draft templates
//!
//! Template-based drafting over a resolved donor record: placeholder
//! substitution only, no outbound calls. A read-only consumer of the
//! engine; nothing here writes to the record store.

use donorbase_common::db::DonorRecord;
use donorbase_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// A named draft template
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    subject: &'static str,
    body: &'static str,
}

/// Sender-side fields substituted alongside the donor record
#[derive(Debug, Clone, Deserialize)]
pub struct DraftContext {
    pub sender_name: String,
    pub sender_organization: String,
}

/// A rendered draft
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Draft {
    pub template: String,
    pub organization_name: String,
    pub subject: String,
    pub body: String,
}

const TEMPLATES: [Template; 5] = [
    Template {
        name: "intro",
        description: "First introduction to a prospective donor",
        subject: "Introducing {sender_organization}",
        body: "Dear {contact_person},\n\n\
               I am writing to introduce {sender_organization} and the work we do. \
               We believe {organization_name} shares our commitment to this cause, \
               and I would welcome the chance to tell you more.\n\n\
               Warm regards,\n{sender_name}\n{sender_organization}",
    },
    Template {
        name: "followup",
        description: "Follow-up when an intro has gone unanswered",
        subject: "Following up: {sender_organization}",
        body: "Dear {contact_person},\n\n\
               I wanted to follow up on my earlier note about {sender_organization}. \
               I know inboxes fill quickly - if it is easier, I am happy to share a \
               one-page summary of our work.\n\n\
               Warm regards,\n{sender_name}\n{sender_organization}",
    },
    Template {
        name: "proposal_cover",
        description: "Cover note accompanying a funding proposal",
        subject: "Funding proposal from {sender_organization}",
        body: "Dear {contact_person},\n\n\
               Please find attached our funding proposal for {organization_name}. \
               We have tailored it to the priorities we discussed, and I would be \
               glad to walk your team through the details.\n\n\
               Warm regards,\n{sender_name}\n{sender_organization}",
    },
    Template {
        name: "meeting_request",
        description: "Request for an introductory meeting",
        subject: "Meeting request: {sender_organization} x {organization_name}",
        body: "Dear {contact_person},\n\n\
               Would you have 30 minutes in the coming weeks for a short call? \
               I would value the chance to introduce {sender_organization} and \
               explore how we might work with {organization_name}.\n\n\
               Warm regards,\n{sender_name}\n{sender_organization}",
    },
    Template {
        name: "thank_you",
        description: "Thank-you note after a closed grant",
        subject: "Thank you from {sender_organization}",
        body: "Dear {contact_person},\n\n\
               On behalf of everyone at {sender_organization}, thank you for the \
               support from {organization_name}. We will share updates on the \
               impact your contribution makes possible.\n\n\
               With gratitude,\n{sender_name}\n{sender_organization}",
    },
];

/// All available templates
pub fn list_templates() -> &'static [Template] {
    &TEMPLATES
}

/// Render a template for a resolved donor record
pub fn render(template_name: &str, record: &DonorRecord, context: &DraftContext) -> Result<Draft> {
    let template = TEMPLATES
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(template_name.trim()))
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "Unknown template '{}' (available: {})",
                template_name,
                TEMPLATES
                    .iter()
                    .map(|t| t.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

    Ok(Draft {
        template: template.name.to_string(),
        organization_name: record.organization_name.clone(),
        subject: substitute(template.subject, record, context),
        body: substitute(template.body, record, context),
    })
}

fn substitute(text: &str, record: &DonorRecord, context: &DraftContext) -> String {
    let contact = record
        .contact_person
        .as_deref()
        .unwrap_or("there")
        .to_string();

    text.replace("{organization_name}", &record.organization_name)
        .replace("{contact_person}", &contact)
        .replace("{stage}", record.current_stage.as_str())
        .replace("{sender_name}", &context.sender_name)
        .replace("{sender_organization}", &context.sender_organization)
}
