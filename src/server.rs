use std::collections::BTreeMap;
use std::time::Duration;

use axum::{routing::post, Router, Json};
use serde::Deserialize;

use crate::data::{Dataset, Problem, Timeslot};
use crate::domain::ClassRoomPools;
use crate::error::SolveError;
use crate::solver::{self, SolveOptions, SolveOutcome};

/// A solve request: the five dataset sections plus optional tuning.
/// Maps are ordered so interned ids stay stable across identical
/// requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub cc: BTreeMap<String, Vec<String>>,
    pub dsd: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub tr: BTreeMap<String, Vec<Timeslot>>,
    #[serde(default)]
    pub rr: BTreeMap<String, String>,
    #[serde(default)]
    pub oc: BTreeMap<String, u8>,
    #[serde(default)]
    pub rooms: Option<Vec<String>>,
    #[serde(default)]
    pub phase2_seconds: Option<f64>,
    #[serde(default)]
    pub min_conflicts_iters: Option<u32>,
    #[serde(default)]
    pub random_seed: Option<u64>,
    #[serde(default)]
    pub class_preferred_rooms: Option<ClassRoomPools>,
}

impl SolveRequest {
    fn dataset(&self) -> Dataset {
        Dataset {
            class_courses: self.cc.clone().into_iter().collect(),
            lecturer_courses: self.dsd.clone().into_iter().collect(),
            forbidden_slots: self.tr.clone().into_iter().collect(),
            required_rooms: self.rr.clone().into_iter().collect(),
            online_counts: self.oc.clone().into_iter().collect(),
            rooms: self.rooms.clone(),
        }
    }

    fn options(&self) -> SolveOptions {
        let mut options = SolveOptions::default();
        if let Some(seconds) = self.phase2_seconds {
            options.phase2_budget = Duration::from_secs_f64(seconds.max(0.0));
        }
        if let Some(iters) = self.min_conflicts_iters {
            options.min_conflicts_iters = iters;
        }
        options.random_seed = self.random_seed;
        options.class_preferred_rooms = self.class_preferred_rooms.clone();
        options
    }
}

async fn solve_handler(
    Json(request): Json<SolveRequest>,
) -> Result<Json<SolveOutcome>, (axum::http::StatusCode, String)> {
    let problem =
        Problem::from_dataset(&request.dataset()).map_err(|e| status_for(&e))?;
    match solver::solve(&problem, &request.options()) {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => Err(status_for(&e)),
    }
}

fn status_for(error: &SolveError) -> (axum::http::StatusCode, String) {
    let status = match error {
        SolveError::InputInvalid(_) | SolveError::Io(_) => axum::http::StatusCode::BAD_REQUEST,
        SolveError::EmptyDomain { .. } | SolveError::Unsatisfiable(_) => {
            axum::http::StatusCode::UNPROCESSABLE_ENTITY
        }
    };
    (status, error.to_string())
}

pub async fn run_server(addr: &str) {
    let app = Router::new().route("/v1/timetable/solve", post(solve_handler));

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    println!("Server running at http://{}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
