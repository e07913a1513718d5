//! AI writing tools: summary and work experience drafting.
//!
//! Both tools are paid features. The subscription level is resolved on every
//! call, the same way the save path does it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::prompts::{
    SUMMARY_PROMPT_TEMPLATE, SUMMARY_SYSTEM, WORK_EXPERIENCE_PROMPT_TEMPLATE,
    WORK_EXPERIENCE_SYSTEM,
};
use crate::billing::subscription::SubscriptionLookup;
use crate::errors::AppError;
use crate::llm_client::TextCompletion;
use crate::resume::document::{rendered, Entry, ResumeContent, WorkExperience};
use crate::resume::entitlement::can_use_ai_tools;

pub const MIN_DESCRIPTION_CHARS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct GenerateWorkExperienceInput {
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct GeneratedSummary {
    pub summary: String,
}

async fn ensure_ai_tools(
    subscriptions: &dyn SubscriptionLookup,
    user_id: &str,
) -> Result<(), AppError> {
    let level = subscriptions.resolve(user_id).await?;
    if !can_use_ai_tools(level) {
        info!("User {user_id} at {level:?} denied AI tools");
        return Err(AppError::AiToolsNotAllowed);
    }
    Ok(())
}

pub async fn generate_summary(
    llm: &dyn TextCompletion,
    subscriptions: &dyn SubscriptionLookup,
    user_id: &str,
    content: &ResumeContent,
) -> Result<GeneratedSummary, AppError> {
    ensure_ai_tools(subscriptions, user_id).await?;

    let prompt = SUMMARY_PROMPT_TEMPLATE.replace("{background}", &build_background(content));
    let summary = llm
        .complete(&prompt, SUMMARY_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(GeneratedSummary { summary })
}

pub async fn generate_work_experience(
    llm: &dyn TextCompletion,
    subscriptions: &dyn SubscriptionLookup,
    user_id: &str,
    input: &GenerateWorkExperienceInput,
) -> Result<WorkExperience, AppError> {
    ensure_ai_tools(subscriptions, user_id).await?;

    let description = input.description.trim();
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "description must be at least {MIN_DESCRIPTION_CHARS} characters"
        )));
    }

    let prompt = WORK_EXPERIENCE_PROMPT_TEMPLATE.replace("{description}", description);
    let answer = llm
        .complete(&prompt, WORK_EXPERIENCE_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(parse_work_experience(&answer))
}

fn text_or<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
}

fn date_or(value: Option<NaiveDate>, fallback: &str) -> String {
    value.map_or_else(|| fallback.to_string(), |d| d.to_string())
}

/// One titled block of the background, placeholders skipped.
fn section<T: Entry>(title: &str, entries: &[T], empty: &str, line: impl Fn(&T) -> String) -> String {
    let lines: Vec<String> = rendered(entries).map(|e| format!("- {}", line(e))).collect();
    if lines.is_empty() {
        format!("{title}:\n{empty}")
    } else {
        format!("{title}:\n{}", lines.join("\n"))
    }
}

/// Renders the resume as the plain-text background the summary prompt expects.
pub fn build_background(content: &ResumeContent) -> String {
    let skills = if content.skills.is_empty() {
        "None".to_string()
    } else {
        content.skills.join(", ")
    };

    [
        format!("Job title:\n{}", text_or(&content.job_title, "Not specified")),
        section(
            "Work experience",
            &content.work_experiences,
            "No formal work experience yet.",
            |w| {
                format!(
                    "{} at {} ({} to {}): {}",
                    text_or(&w.position, "Position"),
                    text_or(&w.company, "Company"),
                    date_or(w.start_date, "Start"),
                    date_or(w.end_date, "Present"),
                    text_or(&w.description, ""),
                )
            },
        ),
        section("Education", &content.educations, "Not specified", |e| {
            format!(
                "{} at {} ({} to {}): {}",
                text_or(&e.field_of_study, "Field"),
                text_or(&e.institution, "Institution"),
                date_or(e.start_date, "Start"),
                date_or(e.end_date, "End"),
                text_or(&e.description, ""),
            )
        }),
        section("Awards", &content.awards, "None", |a| {
            format!(
                "{} from {} ({}): {}",
                text_or(&a.title, "Title"),
                text_or(&a.issuer, "Issuer"),
                date_or(a.date_received, "Date"),
                text_or(&a.description, ""),
            )
        }),
        section("Certificates", &content.certificates, "None", |c| {
            format!(
                "{} from {} ({}): {}",
                text_or(&c.title, "Title"),
                text_or(&c.issuer, "Issuer"),
                date_or(c.issue_date, "Date"),
                text_or(&c.description, ""),
            )
        }),
        section("Projects", &content.projects, "None", |p| {
            format!(
                "{} ({}): {}",
                text_or(&p.title, "Title"),
                date_or(p.publication_date, "Date"),
                text_or(&p.description, ""),
            )
        }),
        format!("Skills:\n{skills}"),
    ]
    .join("\n\n")
}

/// Parses the fixed line format requested by `WORK_EXPERIENCE_SYSTEM`.
/// Missing fields stay empty; dates that are not `YYYY-MM-DD` are dropped.
pub fn parse_work_experience(answer: &str) -> WorkExperience {
    let mut entry = WorkExperience::default();
    let mut description: Option<Vec<&str>> = None;

    for line in answer.lines() {
        if let Some(lines) = description.as_mut() {
            lines.push(line);
            continue;
        }

        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Job title:") {
            entry.position = non_empty(rest);
        } else if let Some(rest) = line.strip_prefix("Company:") {
            entry.company = non_empty(rest);
        } else if let Some(rest) = line.strip_prefix("Start date:") {
            entry.start_date = leading_date(rest);
        } else if let Some(rest) = line.strip_prefix("End date:") {
            entry.end_date = leading_date(rest);
        } else if let Some(rest) = line.strip_prefix("Description:") {
            description = Some(vec![rest]);
        }
    }

    entry.description = description.and_then(|lines| non_empty(&lines.join("\n")));
    entry
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn leading_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let candidate = raw.get(..10)?;
    NaiveDate::parse_from_str(candidate, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::llm_client::LlmError;
    use crate::resume::document::Award;
    use crate::resume::entitlement::SubscriptionLevel;
    use crate::resume::gateway::testing::FixedLevel;

    struct CannedLlm {
        answer: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedLlm {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextCompletion for CannedLlm {
        async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer.clone())
        }
    }

    const ANSWER: &str = "Job title: Backend Engineer\n\
        Company: Acme Corp\n\
        Start date: 2021-03-01\n\
        End date: (not provided)\n\
        Description:\n\
        - Built the billing service\n\
        - Cut p99 latency by 40%";

    #[test]
    fn test_parse_work_experience_reads_every_field() {
        let entry = parse_work_experience(ANSWER);
        assert_eq!(entry.position.as_deref(), Some("Backend Engineer"));
        assert_eq!(entry.company.as_deref(), Some("Acme Corp"));
        assert_eq!(entry.start_date, NaiveDate::from_ymd_opt(2021, 3, 1));
        assert_eq!(entry.end_date, None);
        assert_eq!(
            entry.description.as_deref(),
            Some("- Built the billing service\n- Cut p99 latency by 40%")
        );
    }

    #[test]
    fn test_parse_work_experience_tolerates_missing_fields() {
        let entry = parse_work_experience("Sorry, I cannot help with that.");
        assert_eq!(entry, WorkExperience::default());
    }

    #[test]
    fn test_background_skips_placeholders() {
        let content = ResumeContent {
            job_title: Some("Data Engineer".into()),
            work_experiences: vec![
                WorkExperience::default(),
                WorkExperience {
                    position: Some("Analyst".into()),
                    company: Some("Initech".into()),
                    ..Default::default()
                },
            ],
            awards: vec![Award::default()],
            skills: vec!["SQL".into(), "Rust".into()],
            ..Default::default()
        };

        let background = build_background(&content);

        assert!(background.contains("Job title:\nData Engineer"));
        assert!(background.contains("- Analyst at Initech (Start to Present): "));
        assert_eq!(background.matches("\n- ").count(), 1);
        assert!(background.contains("Awards:\nNone"));
        assert!(background.contains("Skills:\nSQL, Rust"));
    }

    #[tokio::test]
    async fn test_free_level_cannot_use_ai_tools() {
        let llm = CannedLlm::new("unused");
        let level = FixedLevel::new(SubscriptionLevel::Free);

        let result = generate_summary(&llm, &level, "user_1", &ResumeContent::default()).await;

        assert!(matches!(result, Err(AppError::AiToolsNotAllowed)));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_short_description_is_rejected_before_calling_model() {
        let llm = CannedLlm::new(ANSWER);
        let level = FixedLevel::new(SubscriptionLevel::Pro);
        let input = GenerateWorkExperienceInput {
            description: "   too short   ".into(),
        };

        let result = generate_work_experience(&llm, &level, "user_1", &input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_paid_level_gets_generated_entry() {
        let llm = CannedLlm::new(ANSWER);
        let level = FixedLevel::new(SubscriptionLevel::ProPlus);
        let input = GenerateWorkExperienceInput {
            description: "I worked on billing at Acme since March 2021".into(),
        };

        let entry = generate_work_experience(&llm, &level, "user_1", &input)
            .await
            .unwrap();

        assert_eq!(entry.company.as_deref(), Some("Acme Corp"));
        assert!(llm.prompts.lock().unwrap()[0].contains("billing at Acme"));
    }
}
