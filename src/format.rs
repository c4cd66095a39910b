//! Urgency scoring and message rendering.
//!
//! Everything here is pure: it takes the collection plus `today` and returns
//! text. Handlers and the scheduler decide where the text goes.

use chrono::NaiveDate;

use crate::db::*;
use crate::fields::*;
use crate::task::Task;
use crate::telegram::Button;

/// Prefix of the callback data carried by completion buttons.
pub const DONE_CALLBACK_PREFIX: &str = "done_";

/// Number of open tasks offered by the completion picker.
pub const DONE_PICKER_SIZE: usize = 10;

/// Characters of the task name shown on a picker button.
pub const BUTTON_NAME_WIDTH: usize = 38;

const BRIEF_TOP: usize = 3;
const BRIEF_OVERDUE_SHOWN: usize = 3;

/// Additive ranking heuristic. Never persisted.
///
/// Priority: high +30, mid +15. Deadline: overdue +60, within 3 days +50,
/// within 7 days +35. Work in progress: +10.
pub fn urgency_score(task: &Task, today: NaiveDate) -> i64 {
    let mut score = match task.pri {
        Priority::High => 30,
        Priority::Mid => 15,
        Priority::Low => 0,
    };
    score += match deadline_days(&task.deadline, today) {
        Some(d) if d < 0 => 60,
        Some(d) if d <= 3 => 50,
        Some(d) if d <= 7 => 35,
        _ => 0,
    };
    if task.status == Status::Wip {
        score += 10;
    }
    score
}

/// Sort by urgency, highest first. Ties keep their original order.
pub fn rank<'a>(tasks: &[&'a Task], today: NaiveDate) -> Vec<&'a Task> {
    let mut ranked = tasks.to_vec();
    ranked.sort_by_key(|t| std::cmp::Reverse(urgency_score(t, today)));
    ranked
}

/// Relative deadline label, or empty when the task has no usable deadline.
pub fn deadline_label(deadline: &str, today: NaiveDate) -> String {
    match deadline_days(deadline, today) {
        None => String::new(),
        Some(d) if d < 0 => format!("⚠️ {}d overdue", -d),
        Some(0) => "🔴 TODAY".into(),
        Some(1) => "🟡 Tomorrow".into(),
        Some(d) if d <= 7 => format!("🟡 {d}d left"),
        Some(_) => format!("📅 {}", deadline.trim()),
    }
}

fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    matches!(deadline_days(&task.deadline, today), Some(d) if d < 0)
}

/// Render one task as a title line plus an indented category line.
///
/// `index` switches the bullet for a `1.` style ordinal.
pub fn format_task(task: &Task, index: Option<usize>, today: NaiveDate) -> String {
    let prefix = match index {
        Some(i) => format!("{i}. "),
        None => "• ".to_string(),
    };
    let label = deadline_label(&task.deadline, today);
    let label = if label.is_empty() { label } else { format!("  {label}") };
    format!(
        "{prefix}{} *{}*{label}\n   _{}_",
        task.pri.icon(),
        sanitize_markup(&task.name),
        sanitize_markup(task.category()),
    )
}

/// Open tasks grouped by category in first-seen order.
pub fn group_by_category<'a>(tasks: &[&'a Task]) -> Vec<(&'a str, Vec<&'a Task>)> {
    let mut groups: Vec<(&str, Vec<&Task>)> = Vec::new();
    for &t in tasks {
        match groups.iter_mut().find(|(cat, _)| *cat == t.category()) {
            Some((_, members)) => members.push(t),
            None => groups.push((t.category(), vec![t])),
        }
    }
    groups
}

/// Full open-task listing for `/tasks`.
pub fn build_task_list(db: &Database, today: NaiveDate) -> String {
    let open = db.open_tasks();
    if open.is_empty() {
        return "✅ No open tasks, all clear!".to_string();
    }

    let mut lines = vec![format!("📋 *{} open tasks:*\n", open.len())];
    for (cat, members) in group_by_category(&open) {
        lines.push(format!("*{}*", sanitize_markup(cat)));
        for t in rank(&members, today) {
            lines.push(format_task(t, None, today));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

/// The daily brief, shared by `/today` and the scheduled push.
pub fn build_daily_brief(db: &Database, today: NaiveDate) -> String {
    let open = db.open_tasks();
    let top = rank(&open, today);
    let overdue: Vec<&Task> = open.iter().copied().filter(|t| is_overdue(t, today)).collect();

    let mut lines = vec![
        "🗓 *Daily Brief*".to_string(),
        format!("📅 {}", today.format("%A, %d %b %Y")),
        String::new(),
        format!("*📊 Status:* {} open · {} done", open.len(), db.done_count()),
        String::new(),
        "*⚡ Top 3 today:*".to_string(),
    ];
    for (i, t) in top.iter().take(BRIEF_TOP).enumerate() {
        lines.push(format_task(t, Some(i + 1), today));
    }

    if !overdue.is_empty() {
        lines.push(String::new());
        lines.push(format!("*🚨 Overdue ({}):*", overdue.len()));
        for t in overdue.iter().take(BRIEF_OVERDUE_SHOWN) {
            lines.push(format_task(t, None, today));
        }
    }

    lines.push(String::new());
    lines.push("💬 Send any text to add a task".to_string());
    lines.push("/tasks — all tasks  |  /done — mark complete".to_string());
    lines.join("\n")
}

/// Counters shown by `/stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub done: usize,
    pub open: usize,
    pub wip: usize,
    pub high: usize,
    pub overdue: usize,
    /// Open tasks per category, largest first; ties keep first-seen order.
    pub by_category: Vec<(String, usize)>,
}

impl Stats {
    pub fn compute(db: &Database, today: NaiveDate) -> Self {
        let open = db.open_tasks();
        let mut by_category: Vec<(String, usize)> = group_by_category(&open)
            .into_iter()
            .map(|(cat, members)| (cat.to_string(), members.len()))
            .collect();
        by_category.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

        Stats {
            done: db.done_count(),
            open: open.len(),
            wip: open.iter().filter(|t| t.status == Status::Wip).count(),
            high: open.iter().filter(|t| t.pri == Priority::High).count(),
            overdue: open.iter().filter(|t| is_overdue(t, today)).count(),
            by_category,
        }
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            "📊 *Stats*\n".to_string(),
            format!("✅ Done: *{}*", self.done),
            format!("📂 Open: *{}*", self.open),
            format!("⚡ Active (WIP): *{}*", self.wip),
            format!("🔴 High priority: *{}*", self.high),
            format!("⚠️ Overdue: *{}*", self.overdue),
            String::new(),
            "*By project:*".to_string(),
        ];
        for (cat, count) in &self.by_category {
            lines.push(format!("  • {}: {count}", sanitize_markup(cat)));
        }
        lines.join("\n")
    }
}

/// Buttons for the most urgent open tasks, one per row.
pub fn done_keyboard(db: &Database, today: NaiveDate) -> Vec<Vec<Button>> {
    rank(&db.open_tasks(), today)
        .into_iter()
        .take(DONE_PICKER_SIZE)
        .map(|t| {
            vec![Button {
                text: format!("{} {}", t.pri.icon(), truncate(&t.name, BUTTON_NAME_WIDTH)),
                callback_data: format!("{DONE_CALLBACK_PREFIX}{}", t.id),
            }]
        })
        .collect()
}

/// Task id carried by a completion button, if the data is one.
pub fn parse_done_callback(data: &str) -> Option<u64> {
    data.strip_prefix(DONE_CALLBACK_PREFIX)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn due_in(days: i64) -> String {
        (today() + Duration::days(days)).format("%Y-%m-%d").to_string()
    }

    fn task(id: u64, pri: Priority, status: Status, deadline: &str, cat: &str) -> Task {
        Task {
            id,
            name: format!("task {id}"),
            pri,
            status,
            deadline: deadline.to_string(),
            cat: cat.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_urgency_score_examples() {
        let t = task(1, Priority::High, Status::Open, &due_in(-1), "");
        assert_eq!(urgency_score(&t, today()), 90);
        let t = task(2, Priority::Mid, Status::Wip, &due_in(5), "");
        assert_eq!(urgency_score(&t, today()), 60);
        let t = task(3, Priority::Low, Status::Open, "", "");
        assert_eq!(urgency_score(&t, today()), 0);
        let t = task(4, Priority::Low, Status::Open, &due_in(0), "");
        assert_eq!(urgency_score(&t, today()), 50);
        let t = task(5, Priority::Mid, Status::Open, &due_in(8), "");
        assert_eq!(urgency_score(&t, today()), 15);
        let t = task(6, Priority::High, Status::Open, "someday", "");
        assert_eq!(urgency_score(&t, today()), 30);
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let a = task(1, Priority::Mid, Status::Open, "", "");
        let b = task(2, Priority::High, Status::Open, "", "");
        let c = task(3, Priority::Mid, Status::Open, "", "");
        let d = task(4, Priority::Mid, Status::Open, "", "");
        let ranked = rank(&[&a, &b, &c, &d], today());
        let ids: Vec<u64> = ranked.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_deadline_labels() {
        assert_eq!(deadline_label("", today()), "");
        assert_eq!(deadline_label("soon", today()), "");
        assert_eq!(deadline_label(&due_in(-3), today()), "⚠️ 3d overdue");
        assert_eq!(deadline_label(&due_in(0), today()), "🔴 TODAY");
        assert_eq!(deadline_label(&due_in(1), today()), "🟡 Tomorrow");
        assert_eq!(deadline_label(&due_in(7), today()), "🟡 7d left");
        assert_eq!(deadline_label("2027-01-01", today()), "📅 2027-01-01");
    }

    #[test]
    fn test_format_task_strips_markup() {
        let mut t = task(1, Priority::High, Status::Open, &due_in(1), "Home");
        t.name = "*fix* the_sink".into();
        assert_eq!(format_task(&t, Some(2), today()), "2. 🔴 *fix thesink*  🟡 Tomorrow\n   _Home_");
        t.deadline.clear();
        assert_eq!(format_task(&t, None, today()), "• 🔴 *fix thesink*\n   _Home_");
    }

    #[test]
    fn test_grouping_keeps_first_seen_order() {
        let db = Database::new(vec![
            task(1, Priority::Low, Status::Open, "", "Work"),
            task(2, Priority::High, Status::Open, "", "Admin"),
            task(3, Priority::High, Status::Open, "", "Work"),
            task(4, Priority::High, Status::Done, "", "Zoo"),
        ]);
        let open = db.open_tasks();
        let groups = group_by_category(&open);
        let cats: Vec<&str> = groups.iter().map(|(c, _)| *c).collect();
        assert_eq!(cats, vec!["Work", "Admin"]);

        let text = build_task_list(&db, today());
        assert!(text.starts_with("📋 *3 open tasks:*"));
        let work = text.find("*Work*").unwrap();
        let admin = text.find("*Admin*").unwrap();
        assert!(work < admin);
        // Within Work, the high-priority task comes first.
        assert!(text.find("task 3").unwrap() < text.find("task 1").unwrap());
        assert!(!text.contains("task 4"));
    }

    #[test]
    fn test_task_list_all_clear() {
        let db = Database::new(vec![task(1, Priority::Low, Status::Done, "", "")]);
        assert_eq!(build_task_list(&db, today()), "✅ No open tasks, all clear!");
    }

    #[test]
    fn test_daily_brief_caps_overdue() {
        let mut tasks: Vec<Task> = (1..=5)
            .map(|i| task(i, Priority::Low, Status::Open, &due_in(-(i as i64)), "X"))
            .collect();
        tasks.push(task(6, Priority::High, Status::Done, "", "X"));
        tasks.push(task(7, Priority::Mid, Status::Open, "", "X"));
        let db = Database::new(tasks);

        let brief = build_daily_brief(&db, today());
        assert!(brief.contains("📅 Friday, 16 Oct 2026"));
        assert!(brief.contains("6 open · 1 done"));
        assert!(brief.contains("*🚨 Overdue (5):*"));
        assert!(brief.contains("1. 🟢 *task 1*"));
        assert!(brief.contains("3. 🟢 *task 3*"));
        assert!(!brief.contains("4. "));
        let overdue_section = &brief[brief.find("Overdue (5)").unwrap()..];
        assert_eq!(overdue_section.matches("• ").count(), 3);
    }

    #[test]
    fn test_daily_brief_without_overdue() {
        let db = Database::new(vec![task(1, Priority::Mid, Status::Open, &due_in(3), "X")]);
        let brief = build_daily_brief(&db, today());
        assert!(!brief.contains("Overdue"));
        assert!(brief.contains("1 open · 0 done"));
    }

    #[test]
    fn test_stats() {
        let db = Database::new(vec![
            task(1, Priority::High, Status::Open, &due_in(-2), "A"),
            task(2, Priority::Low, Status::Wip, "", "B"),
            task(3, Priority::Mid, Status::Open, "", "B"),
            task(4, Priority::High, Status::Done, &due_in(-9), "A"),
            task(5, Priority::Low, Status::Open, "", "C"),
        ]);
        let stats = Stats::compute(&db, today());
        assert_eq!(stats.done, 1);
        assert_eq!(stats.open, 4);
        assert_eq!(stats.wip, 1);
        assert_eq!(stats.high, 1);
        assert_eq!(stats.overdue, 1);
        assert_eq!(
            stats.by_category,
            vec![("B".to_string(), 2), ("A".to_string(), 1), ("C".to_string(), 1)]
        );
        let text = stats.render();
        assert!(text.contains("⚠️ Overdue: *1*"));
        assert!(text.contains("  • B: 2"));
    }

    #[test]
    fn test_done_keyboard_takes_top_ten() {
        let mut tasks: Vec<Task> = (1..=12).map(|i| task(i, Priority::Low, Status::Open, "", "")).collect();
        tasks[11].pri = Priority::High;
        tasks[0].name = "a very long task name that will certainly not fit on a button".into();
        let db = Database::new(tasks);

        let keyboard = done_keyboard(&db, today());
        assert_eq!(keyboard.len(), 10);
        assert_eq!(keyboard[0][0].callback_data, "done_12");
        assert_eq!(keyboard[1][0].callback_data, "done_1");
        assert_eq!(keyboard[1][0].text.chars().count(), 2 + BUTTON_NAME_WIDTH);
        assert_eq!(keyboard[9][0].callback_data, "done_9");
    }

    #[test]
    fn test_parse_done_callback() {
        assert_eq!(parse_done_callback("done_17"), Some(17));
        assert_eq!(parse_done_callback("done_x"), None);
        assert_eq!(parse_done_callback("undo_3"), None);
    }
}
