//! /prompts and /prompt commands - starter prompts

use super::CommandResult;

pub struct PromptsCommand;

impl PromptsCommand {
    /// Numbered list of starter prompts
    pub fn list(prompts: &[String]) -> CommandResult {
        if prompts.is_empty() {
            return CommandResult::Message("No starter prompts configured.".to_string());
        }

        let mut output = String::from("Starter prompts:\n");
        for (i, prompt) in prompts.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, prompt));
        }
        output.push_str("\nAsk one with: /prompt <n>");
        CommandResult::Message(output)
    }

    /// Submit the starter prompt numbered `args` (1-based)
    pub fn pick(args: &str, prompts: &[String]) -> CommandResult {
        if args.is_empty() {
            return Self::list(prompts);
        }
        match args.parse::<usize>() {
            Ok(n) if n >= 1 && n <= prompts.len() => CommandResult::Submit(prompts[n - 1].clone()),
            _ => CommandResult::Message(format!(
                "No starter prompt '{}'\nUse /prompts to list them",
                args
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompts() -> Vec<String> {
        vec!["What is this?".into(), "How do I start?".into()]
    }

    #[test]
    fn test_pick_is_one_based() {
        assert_eq!(
            PromptsCommand::pick("2", &prompts()),
            CommandResult::Submit("How do I start?".into())
        );
    }

    #[test]
    fn test_pick_out_of_range() {
        for args in ["0", "3", "two"] {
            assert!(matches!(
                PromptsCommand::pick(args, &prompts()),
                CommandResult::Message(_)
            ));
        }
    }

    #[test]
    fn test_list_numbers_prompts() {
        match PromptsCommand::list(&prompts()) {
            CommandResult::Message(text) => {
                assert!(text.contains("1. What is this?"));
                assert!(text.contains("2. How do I start?"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
