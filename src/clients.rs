pub mod anthropic;
pub mod discord;
pub mod naver;
pub mod sheets;

pub use anthropic::{AnthropicClient, CompletionRequest, LanguageModel};
pub use discord::{AlertLevel, DiscordNotifier};
pub use naver::{NaverClient, RankingSource};
pub use sheets::{GoogleSheetsClient, MemorySheetStore, SheetStore};
