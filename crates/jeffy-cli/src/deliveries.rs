//! `deliveries eta|route|matrix`: Maps lookups for dispatchers.

use anyhow::Context;
use clap::Subcommand;
use jeffy_core::AppConfig;
use jeffy_maps::{LatLng, MapsClient, Waypoint};

const MAPS_BACKOFF_BASE_MS: u64 = 500;

/// Sub-commands available under `deliveries`.
#[derive(Debug, Subcommand)]
pub enum DeliveriesCommands {
    /// Recompute a delivery's ETA from the driver's latest location
    Eta {
        delivery_id: i64,
        /// Print the route without storing the ETA
        #[arg(long)]
        dry_run: bool,
    },
    /// Driving route between two places ("lat,lng" or a street address)
    Route {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Drive times from every origin to every destination
    Matrix {
        #[arg(long = "origin", required = true)]
        origins: Vec<String>,
        #[arg(long = "destination", required = true)]
        destinations: Vec<String>,
    },
}

pub(crate) async fn run(
    config: &AppConfig,
    pool: &sqlx::PgPool,
    command: DeliveriesCommands,
) -> anyhow::Result<()> {
    let key = config
        .maps_api_key
        .as_deref()
        .context("GOOGLE_MAPS_API_KEY must be set for delivery routing")?;
    let maps = MapsClient::new(key, config.maps_timeout_secs)?
        .with_retry_policy(config.maps_max_retries, MAPS_BACKOFF_BASE_MS);

    match command {
        DeliveriesCommands::Eta {
            delivery_id,
            dry_run,
        } => refresh_eta(&maps, pool, delivery_id, dry_run).await,
        DeliveriesCommands::Route { from, to } => {
            let summary = maps
                .directions(&parse_waypoint(&from), &parse_waypoint(&to))
                .await?;
            println!(
                "{}: {} in {}",
                if summary.summary.is_empty() { "route" } else { &summary.summary },
                format_distance(summary.distance_meters),
                format_duration(summary.duration_seconds)
            );
            Ok(())
        }
        DeliveriesCommands::Matrix {
            origins,
            destinations,
        } => {
            let origins: Vec<Waypoint> = origins.iter().map(|s| parse_waypoint(s)).collect();
            let destinations: Vec<Waypoint> =
                destinations.iter().map(|s| parse_waypoint(s)).collect();
            let matrix = maps.distance_matrix(&origins, &destinations).await?;
            for cell in &matrix.cells {
                let origin = matrix.origins.get(cell.origin_index).map_or("?", String::as_str);
                let destination = matrix
                    .destinations
                    .get(cell.destination_index)
                    .map_or("?", String::as_str);
                match (cell.distance_meters, cell.duration_seconds) {
                    (Some(distance), Some(duration)) => println!(
                        "{origin} -> {destination}: {} in {}",
                        format_distance(distance),
                        format_duration(duration)
                    ),
                    _ => println!("{origin} -> {destination}: {}", cell.status),
                }
            }
            Ok(())
        }
    }
}

async fn refresh_eta(
    maps: &MapsClient,
    pool: &sqlx::PgPool,
    delivery_id: i64,
    dry_run: bool,
) -> anyhow::Result<()> {
    let route = jeffy_db::get_delivery_route(pool, delivery_id)
        .await?
        .with_context(|| format!("delivery {delivery_id} not found"))?;
    let (Some(lat), Some(lng)) = (route.driver_latitude, route.driver_longitude) else {
        anyhow::bail!("driver for delivery {delivery_id} has not reported a location yet");
    };
    let destination = route
        .shipping_address
        .as_ref()
        .and_then(Waypoint::from_address_json)
        .with_context(|| format!("delivery {delivery_id} has no usable shipping address"))?;

    let summary = maps
        .directions(&Waypoint::Coordinates(LatLng { lat, lng }), &destination)
        .await?;
    println!(
        "delivery {delivery_id}: {} away, ETA {}",
        format_distance(summary.distance_meters),
        format_duration(summary.duration_seconds)
    );

    if dry_run {
        return Ok(());
    }
    let eta_seconds = i32::try_from(summary.duration_seconds).unwrap_or(i32::MAX);
    let distance_meters = i32::try_from(summary.distance_meters).unwrap_or(i32::MAX);
    jeffy_db::set_delivery_eta(pool, delivery_id, eta_seconds, distance_meters)
        .await?
        .with_context(|| format!("delivery {delivery_id} disappeared while routing"))?;
    tracing::info!(delivery_id, eta_seconds, distance_meters, "delivery ETA stored");
    Ok(())
}

/// `"53.8,-1.55"` becomes coordinates; anything else is an address.
fn parse_waypoint(input: &str) -> Waypoint {
    let coords = input.split_once(',').and_then(|(lat, lng)| {
        let lat: f64 = lat.trim().parse().ok()?;
        let lng: f64 = lng.trim().parse().ok()?;
        ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng))
            .then_some(LatLng { lat, lng })
    });
    match coords {
        Some(latlng) => Waypoint::Coordinates(latlng),
        None => Waypoint::Address(input.trim().to_owned()),
    }
}

fn format_distance(meters: u64) -> String {
    if meters < 1000 {
        format!("{meters} m")
    } else {
        format!("{:.1} km", meters as f64 / 1000.0)
    }
}

fn format_duration(seconds: u64) -> String {
    let minutes = seconds.div_ceil(60);
    if minutes < 60 {
        format!("{minutes} min")
    } else {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_waypoint_detects_coordinates() {
        assert_eq!(
            parse_waypoint("53.8, -1.55"),
            Waypoint::Coordinates(LatLng {
                lat: 53.8,
                lng: -1.55
            })
        );
    }

    #[test]
    fn parse_waypoint_falls_back_to_address() {
        assert_eq!(
            parse_waypoint("1 Park Row, Leeds"),
            Waypoint::Address("1 Park Row, Leeds".to_owned())
        );
        // Out of range latitude is not a coordinate.
        assert!(matches!(parse_waypoint("95,10"), Waypoint::Address(_)));
    }

    #[test]
    fn formats_are_human_readable() {
        assert_eq!(format_distance(850), "850 m");
        assert_eq!(format_distance(12_345), "12.3 km");
        assert_eq!(format_duration(61), "2 min");
        assert_eq!(format_duration(3_900), "1h 05m");
    }
}
