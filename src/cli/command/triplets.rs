use anyhow::{Context, Result};
use tracing::info;

use crate::{
    client::AwdbClient, config::Settings, ingest::StationDirectory, station::StationTriplet,
};

/// Lists the station triplets the directory reports for `network`.
pub async fn triplets(settings: &Settings, network: &str) -> Result<Vec<StationTriplet>> {
    let client = AwdbClient::new(&settings.base_url, settings.request_timeout())?;

    let triplets = list(&client, network).await?;
    info!(network, stations = triplets.len(), "Listed stations");

    Ok(triplets)
}

async fn list<D: StationDirectory + ?Sized>(
    directory: &D,
    network: &str,
) -> Result<Vec<StationTriplet>> {
    directory
        .list_station_triplets(network)
        .await
        .with_context(|| format!("Failed to list stations for network {}", network))
}

// -- Tests -------------------------------------------------------------------
