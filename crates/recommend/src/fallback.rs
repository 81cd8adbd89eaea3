//! Offline fallback pool, keyed by time of day. Served whenever the
//! upstream is unavailable or returns something unusable.

use shared::domain::{Task, TaskCategory};

use crate::RECOMMENDED_TASK_COUNT;

struct PoolTask {
    id: &'static str,
    title: &'static str,
    category: TaskCategory,
    desc: &'static str,
}

impl PoolTask {
    fn to_task(&self) -> Task {
        Task {
            id: self.id.to_string(),
            title: self.title.to_string(),
            desc: self.desc.to_string(),
            category: self.category,
            color: self.category.color().as_str().to_string(),
        }
    }
}

const MORNING: &[PoolTask] = &[
    PoolTask {
        id: "off_m1",
        title: "Drink warm water",
        category: TaskCategory::Body,
        desc: "Pour half a glass of warm water and drink it slowly, letting the warmth wake your body.",
    },
    PoolTask {
        id: "off_m2",
        title: "Open a window",
        category: TaskCategory::Care,
        desc: "Step to the window and take three deep breaths of fresh air. A new day is starting.",
    },
    PoolTask {
        id: "off_m3",
        title: "Splash your face",
        category: TaskCategory::Body,
        desc: "Pat your face three times with cool water and towel off. A gentle wake-up call.",
    },
];

const NOON: &[PoolTask] = &[
    PoolTask {
        id: "off_n1",
        title: "Stand and turn around",
        category: TaskCategory::Body,
        desc: "Rise from your seat and turn a slow full circle, stretching your back out of the sitting slump.",
    },
    PoolTask {
        id: "off_n2",
        title: "Gaze out the window",
        category: TaskCategory::Focus,
        desc: "Look at something far away for ten seconds and let your eyes and mind rest on the distance.",
    },
    PoolTask {
        id: "off_n3",
        title: "Tidy one desk corner",
        category: TaskCategory::Focus,
        desc: "Clear just one corner of your desk and enjoy the small patch of order.",
    },
];

const EVENING: &[PoolTask] = &[
    PoolTask {
        id: "off_e1",
        title: "Pour yourself water",
        category: TaskCategory::Care,
        desc: "Fill your glass halfway with warm water and keep it in reach. You are looking after yourself.",
    },
    PoolTask {
        id: "off_e2",
        title: "Three deep breaths",
        category: TaskCategory::Care,
        desc: "Sit or stand tall and take three slow breaths, feeling your chest rise and settle.",
    },
    PoolTask {
        id: "off_e3",
        title: "Fluff your pillow",
        category: TaskCategory::Focus,
        desc: "Plump and straighten your pillow so the room starts winding down with you.",
    },
];

fn pool_for(time_of_day: Option<&str>) -> &'static [PoolTask] {
    match time_of_day {
        Some("morning") => MORNING,
        Some("noon") => NOON,
        _ => EVENING,
    }
}

/// Three tasks from the pool for the given time of day, skipping recently
/// shown titles when enough unseen ones remain, cycling otherwise.
pub fn fallback_tasks(time_of_day: Option<&str>, recent_titles: &[String]) -> Vec<Task> {
    let pool = pool_for(time_of_day);
    let fresh: Vec<&PoolTask> = pool
        .iter()
        .filter(|task| !recent_titles.iter().any(|title| title == task.title))
        .collect();
    let source: Vec<&PoolTask> = if fresh.is_empty() {
        pool.iter().collect()
    } else {
        fresh
    };

    (0..RECOMMENDED_TASK_COUNT)
        .map(|i| source[i % source.len()].to_task())
        .collect()
}
