//! Read-only planner queries over local collections.
//!
//! # Responsibility
//! - Order homework and exams for display.
//! - Derive date-relative flags (days left, urgency).
//!
//! # Invariants
//! - Queries never mutate their input; they return sorted copies.
//! - Sorts are stable, so equal keys keep collection order.
//! - Urgency counts whole calendar days from `today`, never hours, so an item
//!   due the day after tomorrow is not urgent at any time of day.

use crate::model::item::{ExamItem, HomeworkItem};
use chrono::NaiveDate;
use std::cmp::Ordering;

/// Homework is urgent when due in fewer than this many days.
pub const URGENT_WITHIN_DAYS: i64 = 2;

/// Secondary ordering applied after open-before-completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HomeworkSort {
    /// Earliest due date first.
    #[default]
    DueDate,
    /// Highest priority first.
    Priority,
    /// Subject name, ascending.
    Subject,
}

/// Returns homework with open items first, then ordered by `sort`.
pub fn sort_homework(items: &[HomeworkItem], sort: HomeworkSort) -> Vec<HomeworkItem> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| {
        a.completed
            .cmp(&b.completed)
            .then_with(|| compare_homework(a, b, sort))
    });
    sorted
}

fn compare_homework(a: &HomeworkItem, b: &HomeworkItem, sort: HomeworkSort) -> Ordering {
    match sort {
        HomeworkSort::DueDate => a.due_date.cmp(&b.due_date),
        HomeworkSort::Priority => b.priority.rank().cmp(&a.priority.rank()),
        HomeworkSort::Subject => a
            .subject
            .to_lowercase()
            .cmp(&b.subject.to_lowercase()),
    }
}

/// Returns exams ordered by date, earliest first.
pub fn sort_exams_by_date(items: &[ExamItem]) -> Vec<ExamItem> {
    let mut sorted = items.to_vec();
    sorted.sort_by_key(|exam| exam.date);
    sorted
}

/// Calendar days from `today` to `date`; negative when `date` has passed.
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Open homework due in under two days (overdue included).
pub fn is_urgent(item: &HomeworkItem, today: NaiveDate) -> bool {
    !item.completed && days_until(item.due_date, today) < URGENT_WITHIN_DAYS
}

/// Exams on or after `today`, earliest first.
pub fn upcoming_exams(items: &[ExamItem], today: NaiveDate) -> Vec<ExamItem> {
    sort_exams_by_date(items)
        .into_iter()
        .filter(|exam| days_until(exam.date, today) >= 0)
        .collect()
}
