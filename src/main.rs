use anyhow::Result;
use nimbus_core::App;

#[tokio::main]
async fn main() -> Result<()> {
    nimbus_core::init()?;

    let app = App::load()?;
    tracing::info!("Nimbus started");

    let requested = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let Some(location) = app.resolve_location(Some(requested.as_str())).await else {
        eprintln!("Could not determine your location. Pass a city name, e.g. `nimbus Paris`.");
        std::process::exit(2);
    };

    let report = match app.refresh(&location).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Weather query failed: {}", e);
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    let units = report.units;
    let current = &report.current;
    println!("{}", report.resolved_name.as_deref().unwrap_or(&report.location));
    println!(
        "  {:.1}{}  {}  humidity {:.0}%  wind {:.1} {}",
        current.temperature,
        units.temperature_symbol(),
        current.condition,
        current.humidity,
        current.wind_speed,
        units.speed_unit()
    );
    if let Some(kind) = current.condition_kind() {
        println!("  category: {}", kind.label());
    }
    if let Some(icon) = current.icon_url() {
        println!("  icon: {}", icon);
    }

    let daily = report.daily_forecast(5);
    if !daily.is_empty() {
        println!("\nForecast:");
        for (day, entry) in daily {
            println!(
                "  {}  {:.1}{}  {}",
                day.format("%a %d %b"),
                entry.snapshot.temperature,
                units.temperature_symbol(),
                entry.snapshot.condition
            );
        }
    }

    let alerts = app.alerts(&location).await;
    if !alerts.is_empty() {
        println!("\nAlerts:");
        for alert in alerts {
            let marker = if alert.is_active_at(report.fetched_at) { " [active]" } else { "" };
            println!("  {} ({}){}", alert.event, alert.sender_name, marker);
        }
    }

    let recorded = app.recent_history(&report.location, 7).len();
    println!("\n{} observations recorded for {} in the last 7 days", recorded, report.location);

    Ok(())
}
