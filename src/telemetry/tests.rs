pub(crate) mod support;

mod worker_log_session;
