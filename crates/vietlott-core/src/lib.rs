pub mod draw;
pub mod game;
pub mod rules;
pub mod streak;

pub use draw::{DrawRecord, is_sorted, sort_draws};
pub use game::{GameDescriptor, TableShape, builtin_games, find_builtin};
pub use rules::{ConfigError, RuleConfig, load_rules, load_rules_or_empty};
pub use streak::{Alert, BigWinRule, Evaluation, evaluate_rule, evaluate_rules};
