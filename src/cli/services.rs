//! `services` command: print the routing table.

use serde::Serialize;

use crate::endpoint::SERVICE_ROUTES;

#[derive(Serialize)]
struct RouteRow {
    name: &'static str,
    service_id: &'static str,
    port: u16,
}

/// Print every supported service with its internal port.
pub fn run_services_command(json: bool) -> anyhow::Result<()> {
    let rows: Vec<RouteRow> = SERVICE_ROUTES
        .iter()
        .map(|r| RouteRow {
            name: r.name,
            service_id: r.service_id,
            port: r.port,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<16} {:<24} {:>5}", "SERVICE", "SDK ID", "PORT");
    for row in rows {
        println!("{:<16} {:<24} {:>5}", row.name, row.service_id, row.port);
    }
    Ok(())
}
