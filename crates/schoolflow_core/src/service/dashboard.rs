//! Dashboard summary derived from local collections.

use crate::model::document::LocalCollections;
use crate::model::item::ExamItem;
use crate::service::agenda::{days_until, upcoming_exams};
use chrono::NaiveDate;

/// Next exam on or after the reference day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextExam {
    pub exam: ExamItem,
    pub days_left: i64,
}

/// Counts and progress shown on the overview screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSummary {
    pub pending_homework: usize,
    pub completed_homework: usize,
    pub next_exam: Option<NextExam>,
    pub completed_sessions: usize,
    pub total_sessions: usize,
    /// Rounded share of completed study sessions; `0` without sessions.
    pub study_progress_percent: u8,
    pub planned_study_minutes: u64,
}

impl DashboardSummary {
    pub fn compute(collections: &LocalCollections, today: NaiveDate) -> Self {
        let completed_homework = collections
            .homework
            .iter()
            .filter(|item| item.completed)
            .count();
        let completed_sessions = collections
            .sessions
            .iter()
            .filter(|session| session.completed)
            .count();
        let total_sessions = collections.sessions.len();

        let next_exam = upcoming_exams(&collections.exams, today)
            .into_iter()
            .next()
            .map(|exam| NextExam {
                days_left: days_until(exam.date, today),
                exam,
            });

        Self {
            pending_homework: collections.homework.len() - completed_homework,
            completed_homework,
            next_exam,
            completed_sessions,
            total_sessions,
            study_progress_percent: progress_percent(completed_sessions, total_sessions),
            planned_study_minutes: collections
                .sessions
                .iter()
                .map(|session| u64::from(session.duration_minutes))
                .sum(),
        }
    }
}

fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // Round half up on integers: (100 * done + total / 2) / total.
    ((done * 100 + total / 2) / total) as u8
}
