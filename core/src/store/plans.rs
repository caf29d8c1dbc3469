use r2d2_sqlite::rusqlite::{self, params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::json_column;
use crate::errors::StudyError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub difficulty: String,
    pub priority: String,
    pub hours_per_week: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
}

/// Payload accepted by `POST /api/study-plan/generate`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudyPlan {
    pub study_method: String,
    pub subjects: Vec<Subject>,
    pub time_slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyPlanRecord {
    pub id: String,
    pub user_id: String,
    pub study_method: String,
    pub subjects: Vec<Subject>,
    pub time_slots: Vec<TimeSlot>,
    pub generated_at: i64,
}

const PLAN_COLUMNS: &str = "id, user_id, study_method, subjects_json, time_slots_json, generated_at";

fn row_to_plan(row: &Row) -> rusqlite::Result<StudyPlanRecord> {
    let subjects: String = row.get(3)?;
    let time_slots: String = row.get(4)?;
    Ok(StudyPlanRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        study_method: row.get(2)?,
        subjects: json_column(3, &subjects)?,
        time_slots: json_column(4, &time_slots)?,
        generated_at: row.get(5)?,
    })
}

pub fn create_plan(
    conn: &Connection,
    user_id: &str,
    plan: &NewStudyPlan,
) -> Result<StudyPlanRecord, StudyError> {
    let study_method = plan.study_method.trim();
    if study_method.is_empty() {
        return Err(StudyError::InvalidInput("study_method must not be empty".into()));
    }
    if plan.subjects.iter().any(|s| s.name.trim().is_empty()) {
        return Err(StudyError::InvalidInput("subject names must not be empty".into()));
    }
    let subjects_json = serde_json::to_string(&plan.subjects)
        .map_err(|err| StudyError::InvalidInput(err.to_string()))?;
    let time_slots_json = serde_json::to_string(&plan.time_slots)
        .map_err(|err| StudyError::InvalidInput(err.to_string()))?;

    let record = StudyPlanRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        study_method: study_method.to_string(),
        subjects: plan.subjects.clone(),
        time_slots: plan.time_slots.clone(),
        generated_at: OffsetDateTime::now_utc().unix_timestamp(),
    };
    conn.execute(
        "INSERT INTO study_plans (id, user_id, study_method, subjects_json, time_slots_json, generated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id,
            record.user_id,
            record.study_method,
            subjects_json,
            time_slots_json,
            record.generated_at,
        ],
    )?;
    Ok(record)
}

/// Most recently generated plan.
pub fn current_plan(conn: &Connection, user_id: &str) -> Result<StudyPlanRecord, StudyError> {
    conn.query_row(
        &format!(
            "SELECT {PLAN_COLUMNS} FROM study_plans WHERE user_id = ?1 ORDER BY generated_at DESC, rowid DESC LIMIT 1"
        ),
        [user_id],
        row_to_plan,
    )
    .optional()?
    .ok_or(StudyError::StudyPlanNotFound)
}

/// All plans, newest first.
pub fn plan_history(conn: &Connection, user_id: &str) -> Result<Vec<StudyPlanRecord>, StudyError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PLAN_COLUMNS} FROM study_plans WHERE user_id = ?1 ORDER BY generated_at DESC, rowid DESC"
    ))?;
    let rows = stmt.query_map([user_id], row_to_plan)?;
    let mut plans = Vec::new();
    for row in rows {
        plans.push(row?);
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::store::users::create_user;
    use pretty_assertions::assert_eq;

    fn sample(method: &str) -> NewStudyPlan {
        NewStudyPlan {
            study_method: method.to_string(),
            subjects: vec![Subject {
                name: "Calculus".into(),
                difficulty: "hard".into(),
                priority: "high".into(),
                hours_per_week: 6,
            }],
            time_slots: vec![TimeSlot {
                day: "monday".into(),
                start_time: "09:00".into(),
                end_time: "11:00".into(),
                is_available: true,
            }],
        }
    }

    #[test]
    fn current_plan_is_the_latest() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();
        let user = create_user(&conn, "ada@example.com", None, "hash").unwrap();

        assert!(matches!(
            current_plan(&conn, &user.id),
            Err(StudyError::StudyPlanNotFound)
        ));

        let first = create_plan(&conn, &user.id, &sample("pomodoro")).unwrap();
        let second = create_plan(&conn, &user.id, &sample("active-recall")).unwrap();

        assert_eq!(current_plan(&conn, &user.id).unwrap(), second);
        let history = plan_history(&conn, &user.id).unwrap();
        assert_eq!(history, vec![second, first]);
    }

    #[test]
    fn plans_are_scoped_to_owner() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();
        let ada = create_user(&conn, "ada@example.com", None, "hash").unwrap();
        let bob = create_user(&conn, "bob@example.com", None, "hash").unwrap();
        create_plan(&conn, &ada.id, &sample("pomodoro")).unwrap();

        assert!(plan_history(&conn, &bob.id).unwrap().is_empty());
    }

    #[test]
    fn blank_method_is_invalid() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();
        let user = create_user(&conn, "ada@example.com", None, "hash").unwrap();
        assert!(matches!(
            create_plan(&conn, &user.id, &sample("  ")),
            Err(StudyError::InvalidInput(_))
        ));
    }
}
