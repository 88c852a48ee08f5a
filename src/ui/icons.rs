//! Icons shared by the terminal views, with plain-text fallbacks.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static WAITING: Emoji<'_, '_> = Emoji("⏳ ", "[..]");
pub static STALE: Emoji<'_, '_> = Emoji("🕸️  ", "[?]");
pub static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static TRASH: Emoji<'_, '_> = Emoji("🗑️  ", "-");
