use crate::driver::{FetchedResult, PollStatus, PollableConnection};
use crate::error::AsyncPoolError;
use crate::results::ResultSet;

/// Successful result of [`AsyncQueryExecutor::execute`](super::AsyncQueryExecutor::execute).
#[derive(Debug, Clone)]
pub enum QueryOutput {
    /// Row count of a statement that returns no rows.
    RowsAffected(u64),
    /// Identifier generated by an `INSERT`, reported instead of its row count.
    InsertId(u64),
    /// Rows returned by a query.
    Rows(ResultSet),
}

impl QueryOutput {
    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            QueryOutput::RowsAffected(count) => Some(*count),
            _ => None,
        }
    }

    #[must_use]
    pub fn insert_id(&self) -> Option<u64> {
        match self {
            QueryOutput::InsertId(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            QueryOutput::Rows(rows) => Some(rows),
            _ => None,
        }
    }
}

impl From<FetchedResult> for QueryOutput {
    fn from(fetched: FetchedResult) -> Self {
        match fetched {
            FetchedResult::RowsAffected(count) => QueryOutput::RowsAffected(count),
            FetchedResult::Rows(rows) => QueryOutput::Rows(rows),
        }
    }
}

/// `true` when `sql` starts with `INSERT`, ignoring ASCII case.
///
/// Leading whitespace is not skipped; callers pass trimmed statements.
#[must_use]
pub fn is_insert_statement(sql: &str) -> bool {
    sql.as_bytes()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"INSERT"))
}

/// Turn one poll status into the query's final outcome.
///
/// Returns `None` while the query is still pending.
pub(super) fn classify<C: PollableConnection>(
    conn: &mut C,
    sql: &str,
    status: PollStatus,
) -> Option<Result<QueryOutput, AsyncPoolError>> {
    let outcome = match status {
        PollStatus::Pending => return None,
        PollStatus::Ready => match conn.fetch_result() {
            Err(message) => Err(AsyncPoolError::QueryExecution(message)),
            Ok(_) if is_insert_statement(sql) => Ok(QueryOutput::InsertId(conn.last_insert_id())),
            Ok(fetched) => Ok(fetched.into()),
        },
        PollStatus::Error => Err(AsyncPoolError::QueryExecution(conn.last_error())),
        PollStatus::Rejected => Err(AsyncPoolError::QueryRejected),
    };
    Some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_prefix_is_case_insensitive() {
        assert!(is_insert_statement("INSERT INTO t VALUES (1)"));
        assert!(is_insert_statement("insert into t values (1)"));
        assert!(is_insert_statement("InSeRt INTO t SELECT 1"));
    }

    #[test]
    fn other_statements_are_not_inserts() {
        assert!(!is_insert_statement("SELECT * FROM t"));
        assert!(!is_insert_statement("UPDATE t SET a = 1"));
        assert!(!is_insert_statement("INSER"));
        assert!(!is_insert_statement(""));
        assert!(!is_insert_statement("  INSERT INTO t VALUES (1)"));
        assert!(!is_insert_statement("REPLACE INTO t VALUES (1)"));
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        assert!(!is_insert_statement("ÄÖÜ"));
        assert!(!is_insert_statement("INSÉRT"));
    }
}
