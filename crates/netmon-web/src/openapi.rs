//! OpenAPI documentation definition.

use netmon_core::model::{BandwidthSample, ConnectivitySample, HourBucket, Status};
use utoipa::OpenApi;

use crate::handlers::{EarliestRecord, StatsResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::handle_health,
        crate::handlers::handle_connectivity,
        crate::handlers::handle_connectivity_earliest,
        crate::handlers::handle_connectivity_latest,
        crate::handlers::handle_connectivity_hours,
        crate::handlers::handle_bandwidth,
        crate::handlers::handle_bandwidth_earliest,
        crate::handlers::handle_bandwidth_latest,
        crate::handlers::handle_stats,
        crate::handlers::handle_csv,
        crate::handlers::handle_csv_hour,
    ),
    components(schemas(
        ConnectivitySample,
        BandwidthSample,
        Status,
        HourBucket,
        EarliestRecord,
        StatsResponse,
    )),
    info(
        title = "netmon API",
        description = "Network reachability and bandwidth history, with CSV export"
    )
)]
pub(crate) struct ApiDoc;
