use sql_poll_pool::is_insert_statement;
use sql_poll_pool::prelude::*;

use crate::backend::BackendStats;
use crate::model::{Finish, PlannedQuery};

/// How a resolved query counted against its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Succeeded,
    PlannedFailure,
    ConnectFailure,
}

pub(crate) struct Oracle;

impl Oracle {
    /// Bookkeeping invariants that must hold in every snapshot.
    pub(crate) fn check_status(status: &PoolStatus) -> Result<(), String> {
        if status.total > status.max_connections {
            return Err(format!(
                "pool holds {} connections over a ceiling of {}",
                status.total, status.max_connections
            ));
        }
        if status.idle + status.busy != status.total {
            return Err(format!(
                "idle {} + busy {} != total {}",
                status.idle, status.busy, status.total
            ));
        }
        if status.waiting > 0 && status.idle > 0 {
            return Err(format!(
                "{} waiters parked next to {} idle connections",
                status.waiting, status.idle
            ));
        }
        if status.waiting > 0 && status.total < status.max_connections {
            return Err(format!(
                "{} waiters parked with only {} of {} connections created",
                status.waiting, status.total, status.max_connections
            ));
        }
        Ok(())
    }

    /// Compare what `execute` returned with how the query was planned to end.
    pub(crate) fn check_outcome(
        plan: &PlannedQuery,
        result: &Result<QueryOutput, AsyncPoolError>,
    ) -> Result<Verdict, String> {
        if let Err(AsyncPoolError::ConnectionFactory(_)) = result {
            return Ok(Verdict::ConnectFailure);
        }

        let matched = match (plan.finish, result) {
            (Finish::Rows(count), Ok(QueryOutput::Rows(rows))) => rows.results.len() == count,
            (Finish::Affected(_), Ok(QueryOutput::InsertId(id))) => {
                is_insert_statement(&plan.sql) && *id == plan.insert_id()
            }
            (Finish::Affected(count), Ok(QueryOutput::RowsAffected(affected))) => {
                !is_insert_statement(&plan.sql) && *affected == count
            }
            (Finish::DriverError, Err(AsyncPoolError::QueryExecution(message))) => {
                message.starts_with("deadlock found")
            }
            (Finish::FetchError, Err(AsyncPoolError::QueryExecution(message))) => {
                message.starts_with("lost result")
            }
            (Finish::Rejected, Err(AsyncPoolError::QueryRejected)) => true,
            (Finish::DispatchError, Err(AsyncPoolError::Dispatch(_))) => true,
            _ => false,
        };

        if !matched {
            return Err(format!("planned {:?}, got {result:?}", plan.finish));
        }
        Ok(if plan.finish.is_planned_failure() {
            Verdict::PlannedFailure
        } else {
            Verdict::Succeeded
        })
    }

    /// Invariants once every caller has its answer: no connection is held, no
    /// one waits, and the pool owns every connection the server opened.
    pub(crate) fn check_quiescent(status: &PoolStatus, stats: &BackendStats) -> Result<(), String> {
        Self::check_status(status)?;
        if status.busy != 0 || status.waiting != 0 {
            return Err(format!(
                "pool not drained: {} busy, {} waiting",
                status.busy, status.waiting
            ));
        }
        if stats.running != 0 {
            return Err(format!("{} connections still running a query", stats.running));
        }
        if status.total != stats.connections_opened {
            return Err(format!(
                "server opened {} connections but the pool tracks {}",
                stats.connections_opened, status.total
            ));
        }
        Ok(())
    }
}
