use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct VisitsResponse {
    pub visits: u64,
}
