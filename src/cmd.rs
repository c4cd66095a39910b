//! Command handlers for the chat interface.
//!
//! Each handler is a stateless request/response: load the whole collection,
//! derive a view or mutate, save if mutated, render a reply. Nothing is cached
//! between interactions, so a completion button always acts on a fresh copy.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::*;
use crate::fields::*;
use crate::format::*;
use crate::store::TaskStore;
use crate::task::NewTask;
use crate::telegram::Outgoing;

/// Slash commands understood by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Help text and the caller's own id.
    Start,
    /// All open tasks grouped by category.
    Tasks,
    /// The daily brief on demand.
    Today,
    /// Pick a task to complete.
    Done,
    /// Counters per status, priority and category.
    Stats,
}

impl Command {
    /// Parse `/name` or `/name@BotName`, ignoring any arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "tasks" => Some(Command::Tasks),
            "today" => Some(Command::Today),
            "done" => Some(Command::Done),
            "stats" => Some(Command::Stats),
            _ => None,
        }
    }
}

/// An inbound interaction routed to a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Command(Command),
    /// Free text without a leading slash.
    Text(String),
    /// A completion button was pressed.
    Complete(u64),
}

const INPUT_HINT: &str = "_💡 ! = High  ·  ~ = Low  ·  | YYYY-MM-DD = deadline_";

/// Handlers sharing the configuration and the task store.
pub struct Handlers {
    config: Arc<Config>,
    store: Arc<dyn TaskStore>,
}

impl Handlers {
    pub fn new(config: Arc<Config>, store: Arc<dyn TaskStore>) -> Self {
        Self { config, store }
    }

    /// Whether `caller` passes the allow-list gate.
    pub fn allows(&self, caller: i64) -> bool {
        self.config.is_allowed(caller)
    }

    /// Route an event from `caller`. `None` means send nothing.
    ///
    /// Callers failing the allow-list get `None` without any trace in chat.
    pub async fn dispatch(&self, caller: i64, event: &Event) -> Option<Outgoing> {
        if !self.allows(caller) {
            debug!(caller, "ignoring unauthorized caller");
            return None;
        }
        match event {
            Event::Command(Command::Start) => Some(self.cmd_start(caller)),
            Event::Command(Command::Tasks) => Some(self.cmd_tasks().await),
            Event::Command(Command::Today) => Some(self.cmd_today().await),
            Event::Command(Command::Done) => Some(self.cmd_done().await),
            Event::Command(Command::Stats) => Some(self.cmd_stats().await),
            Event::Text(text) => self.cmd_add(text).await,
            Event::Complete(id) => Some(self.cmd_complete(*id).await),
        }
    }

    pub fn cmd_start(&self, caller: i64) -> Outgoing {
        Outgoing::text(format!(
            "🤖 *Task Bot*\n\n\
             Your Telegram ID: `{caller}`\n\n\
             *Commands:*\n\
             /tasks — all open tasks\n\
             /today — today's brief\n\
             /done — mark a task complete\n\
             /stats — statistics\n\n\
             *To add a task just type:*\n\
             `Task name` — Mid priority\n\
             `! Task name` — High priority 🔴\n\
             `~ Task name` — Low priority 🟢\n\
             `Task | 2026-03-15` — with a deadline"
        ))
    }

    pub async fn cmd_tasks(&self) -> Outgoing {
        let db = self.store.load().await;
        Outgoing::text(build_task_list(&db, today()))
    }

    pub async fn cmd_today(&self) -> Outgoing {
        let db = self.store.load().await;
        Outgoing::text(build_daily_brief(&db, today()))
    }

    pub async fn cmd_stats(&self) -> Outgoing {
        let db = self.store.load().await;
        Outgoing::text(Stats::compute(&db, today()).render())
    }

    /// Offer the most urgent open tasks as buttons.
    pub async fn cmd_done(&self) -> Outgoing {
        let db = self.store.load().await;
        if db.open_tasks().is_empty() {
            return Outgoing::text("No open tasks!");
        }
        Outgoing::with_keyboard("✅ *Which task did you finish?*", done_keyboard(&db, today()))
    }

    /// Mark a task done. The reply replaces the picker message.
    pub async fn cmd_complete(&self, id: u64) -> Outgoing {
        let mut db = self.store.load().await;
        let Some(task) = db.get_mut(id) else {
            warn!(task_id = id, "completion for unknown task");
            return Outgoing::text("Task not found.");
        };
        let name = sanitize_markup(&task.name);
        if task.status == Status::Done {
            return Outgoing::text(format!("☑️ *{name}* was already done."));
        }
        task.status = Status::Done;
        task.completed_at = Some(now_stamp());

        if self.store.save(&db).await {
            info!(task_id = id, "task completed");
            Outgoing::text(format!("✅ *{name}* — done! 🎉"))
        } else {
            Outgoing::text("❌ Failed to save.")
        }
    }

    /// Turn free text into a new open task.
    pub async fn cmd_add(&self, text: &str) -> Option<Outgoing> {
        if text.trim().is_empty() {
            return None;
        }
        let Some(new) = NewTask::parse(text) else {
            return Some(Outgoing::text(INPUT_HINT));
        };
        let (name, pri, deadline) = (sanitize_markup(&new.name), new.pri, new.deadline.clone());

        let mut db = self.store.load().await;
        let id = db.add(new, &self.config.default_category, now_stamp());
        if !self.store.save(&db).await {
            return Some(Outgoing::text("❌ Failed to save to Drive."));
        }
        info!(task_id = id, "task added");

        let deadline = if deadline.is_empty() { deadline } else { format!("\n📅 {deadline}") };
        Some(Outgoing::text(format!(
            "✅ Added: {} *{name}*{deadline}\n\n{INPUT_HINT}",
            pri.icon()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::store::memory::MemoryStore;
    use crate::task::Task;
    use std::sync::atomic::Ordering;

    fn handlers(allowed: Option<i64>, tasks: Vec<Task>) -> (Handlers, Arc<MemoryStore>) {
        let mut config = test_config();
        config.allowed_user_id = allowed;
        let store = Arc::new(MemoryStore::new(Database::new(tasks)));
        (Handlers::new(Arc::new(config), store.clone()), store)
    }

    fn task(id: u64, name: &str, status: Status) -> Task {
        Task { id, name: name.into(), status, ..Default::default() }
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/tasks"), Some(Command::Tasks));
        assert_eq!(Command::parse("/today@my_task_bot"), Some(Command::Today));
        assert_eq!(Command::parse("/done now please"), Some(Command::Done));
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("tasks"), None);
    }

    #[tokio::test]
    async fn test_unauthorized_caller_gets_nothing() {
        let (h, store) = handlers(Some(100), vec![task(1, "a", Status::Open)]);
        for event in [
            Event::Command(Command::Start),
            Event::Command(Command::Tasks),
            Event::Command(Command::Today),
            Event::Command(Command::Done),
            Event::Command(Command::Stats),
            Event::Text("buy milk".into()),
            Event::Complete(1),
        ] {
            assert!(h.dispatch(200, &event).await.is_none());
        }
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert_eq!(store.snapshot().tasks[0].status, Status::Open);
        assert!(h.dispatch(100, &Event::Command(Command::Start)).await.is_some());
    }

    #[tokio::test]
    async fn test_start_echoes_caller_id() {
        let (h, _) = handlers(None, vec![]);
        let reply = h.dispatch(4242, &Event::Command(Command::Start)).await.unwrap();
        assert!(reply.text.contains("`4242`"));
    }

    #[tokio::test]
    async fn test_add_assigns_next_id() {
        let (h, store) = handlers(None, vec![task(7, "old", Status::Done)]);
        let reply = h.dispatch(1, &Event::Text("! Pay rent | 2026-03-15".into())).await.unwrap();
        assert!(reply.text.starts_with("✅ Added: 🔴 *Pay rent*\n📅 2026-03-15"));

        let db = store.snapshot();
        let added = db.tasks.last().unwrap();
        assert_eq!(added.id, 8);
        assert_eq!(added.pri, Priority::High);
        assert_eq!(added.deadline, "2026-03-15");
        assert_eq!(added.cat, "Inbox");
        assert!(!added.created_at.is_empty());
    }

    #[tokio::test]
    async fn test_add_to_empty_store_starts_at_one() {
        let (h, store) = handlers(None, vec![]);
        h.cmd_add("water plants").await.unwrap();
        assert_eq!(store.snapshot().tasks[0].id, 1);
        assert_eq!(store.snapshot().tasks[0].pri, Priority::Mid);
    }

    #[tokio::test]
    async fn test_add_without_name_only_hints() {
        let (h, store) = handlers(None, vec![]);
        let reply = h.cmd_add("! | 2026-01-01").await.unwrap();
        assert_eq!(reply.text, INPUT_HINT);
        assert!(h.cmd_add("   ").await.is_none());
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_add_reports_save_failure() {
        let (h, store) = handlers(None, vec![]);
        store.fail_saves.store(true, Ordering::SeqCst);
        let reply = h.cmd_add("anything").await.unwrap();
        assert_eq!(reply.text, "❌ Failed to save to Drive.");
    }

    #[tokio::test]
    async fn test_complete_unknown_id_changes_nothing() {
        let (h, store) = handlers(None, vec![task(1, "a", Status::Open)]);
        let reply = h.dispatch(1, &Event::Complete(99)).await.unwrap();
        assert_eq!(reply.text, "Task not found.");
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert_eq!(store.snapshot().tasks[0].status, Status::Open);
    }

    #[tokio::test]
    async fn test_complete_marks_done_and_persists() {
        let (h, store) = handlers(None, vec![task(1, "a", Status::Open), task(2, "*b*", Status::Wip)]);
        let reply = h.cmd_complete(2).await;
        assert_eq!(reply.text, "✅ *b* — done! 🎉");

        let db = store.snapshot();
        assert_eq!(db.tasks[1].status, Status::Done);
        assert!(db.tasks[1].completed_at.as_deref().is_some_and(|s| !s.is_empty()));
        assert_eq!(db.tasks[0].status, Status::Open);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_complete_already_done_keeps_timestamp() {
        let mut done = task(3, "c", Status::Done);
        done.completed_at = Some("2026-01-01 08:00".into());
        let (h, store) = handlers(None, vec![done]);
        let reply = h.cmd_complete(3).await;
        assert!(reply.text.contains("already done"));
        assert_eq!(store.snapshot().tasks[0].completed_at.as_deref(), Some("2026-01-01 08:00"));
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_complete_reports_save_failure() {
        let (h, store) = handlers(None, vec![task(1, "a", Status::Open)]);
        store.fail_saves.store(true, Ordering::SeqCst);
        assert_eq!(h.cmd_complete(1).await.text, "❌ Failed to save.");
    }

    #[tokio::test]
    async fn test_done_picker() {
        let (h, _) = handlers(None, vec![task(1, "done already", Status::Done)]);
        let reply = h.cmd_done().await;
        assert_eq!(reply.text, "No open tasks!");
        assert!(reply.keyboard.is_empty());

        let (h, _) = handlers(None, vec![task(1, "a", Status::Open), task(2, "b", Status::Done)]);
        let reply = h.cmd_done().await;
        assert_eq!(reply.keyboard.len(), 1);
        assert_eq!(reply.keyboard[0][0].callback_data, "done_1");
    }

    #[tokio::test]
    async fn test_views_render_from_store() {
        let (h, _) = handlers(None, vec![task(1, "a", Status::Open), task(2, "b", Status::Done)]);
        assert!(h.cmd_tasks().await.text.contains("*1 open tasks:*"));
        assert!(h.cmd_today().await.text.contains("1 open · 1 done"));
        assert!(h.cmd_stats().await.text.contains("✅ Done: *1*"));
    }
}
