//! Harvest records: one per review comment, ready for fine-tuning corpora.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::api::RawComment;
use crate::sanitize::sanitize;
use crate::target::Target;

/// Review instructions a prompt's system turn is drawn from
pub const SYSTEM_MESSAGES: [&str; 10] = [
    "Por favor, revise o código a seguir:",
    "Confira o código abaixo e forneça seus comentários:",
    "Revise o trecho de código a seguir:",
    "Dê uma olhada neste código e sugira melhorias:",
    "Analise o código abaixo e compartilhe sua opinião:",
    "Please review the following code:",
    "Check the code below and provide your comments:",
    "Review the code snippet below:",
    "Take a look at this code and suggest improvements:",
    "Analyze the code below and share your feedback:",
];

/// One output row. Field names are the on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRecord {
    pub project_name: String,
    pub pull_request_url: String,
    /// Diff hunk with code comments stripped
    pub diff_hunk: String,
    /// Reviewer's comment body
    pub comments: String,
    pub prompt: String,
}

/// Llama-2 chat framing of one (diff, comment) pair
pub fn format_prompt(system_message: &str, diff: &str, comment: &str) -> String {
    format!("<s>[INST] <<SYS>>\n{system_message}\n<</SYS>>{diff} [/INST]{comment} </s>")
}

pub fn build_record<R: Rng + ?Sized>(
    target: &Target,
    raw: &RawComment,
    rng: &mut R,
) -> HarvestRecord {
    let diff_hunk = sanitize(&raw.diff_hunk);
    let system_message = SYSTEM_MESSAGES
        .choose(rng)
        .copied()
        .unwrap_or(SYSTEM_MESSAGES[0]);
    let prompt = format_prompt(system_message, &diff_hunk, &raw.body);
    HarvestRecord {
        project_name: target.project_name(),
        pull_request_url: raw.pull_request_url.clone(),
        diff_hunk,
        comments: raw.body.clone(),
        prompt,
    }
}

/// Records for a target's comments, in fetch order
pub fn build_records<R: Rng + ?Sized>(
    target: &Target,
    comments: &[RawComment],
    rng: &mut R,
) -> Vec<HarvestRecord> {
    comments
        .iter()
        .map(|raw| build_record(target, raw, rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn raw(diff: &str, body: &str) -> RawComment {
        RawComment {
            pull_request_url: "https://api.github.com/repos/octo/widgets/pulls/12".into(),
            diff_hunk: diff.into(),
            body: body.into(),
        }
    }

    #[test]
    fn record_fields() {
        let target = Target::new("octo", "widgets");
        let mut rng = StdRng::seed_from_u64(7);
        let record = build_record(
            &target,
            &raw("+let x = 1; // why\n", "Use a const here."),
            &mut rng,
        );

        assert_eq!(record.project_name, "octo/widgets");
        assert_eq!(
            record.pull_request_url,
            "https://api.github.com/repos/octo/widgets/pulls/12"
        );
        assert_eq!(record.diff_hunk, "+let x = 1; \n");
        assert_eq!(record.comments, "Use a const here.");
    }

    #[test]
    fn prompt_uses_sanitized_diff_and_a_pool_message() {
        let target = Target::new("octo", "widgets");
        let mut rng = StdRng::seed_from_u64(1);
        let record = build_record(&target, &raw("+a /* b */", "nit"), &mut rng);

        let sys = SYSTEM_MESSAGES
            .iter()
            .find(|m| record.prompt.contains(*m))
            .expect("prompt carries a system message");
        assert_eq!(record.prompt, format_prompt(sys, "+a ", "nit"));
        assert!(record.prompt.starts_with("<s>[INST] <<SYS>>\n"));
        assert!(record.prompt.ends_with("\n<</SYS>>+a  [/INST]nit </s>"));
    }

    #[test]
    fn same_seed_same_messages() {
        let target = Target::new("a", "b");
        let comments: Vec<_> = (0..20).map(|i| raw("+x", &format!("c{i}"))).collect();

        let first = build_records(&target, &comments, &mut StdRng::seed_from_u64(42));
        let second = build_records(&target, &comments, &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
        assert_eq!(first.len(), 20);
        assert_eq!(first[19].comments, "c19");
    }

    #[test]
    fn draws_cover_the_pool() {
        let mut rng = StdRng::seed_from_u64(3);
        let target = Target::new("a", "b");
        let comment = raw("+x", "y");
        let seen: std::collections::HashSet<String> = (0..500)
            .map(|_| build_record(&target, &comment, &mut rng).prompt)
            .collect();
        assert_eq!(seen.len(), SYSTEM_MESSAGES.len());
    }

    #[test]
    fn serializes_with_record_field_names() {
        let record = HarvestRecord {
            project_name: "a/b".into(),
            pull_request_url: "u".into(),
            diff_hunk: "d".into(),
            comments: "c".into(),
            prompt: "p".into(),
        };
        let value = serde_json::to_value(&record).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            ["comments", "diff_hunk", "project_name", "prompt", "pull_request_url"]
        );
    }
}
