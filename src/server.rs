//! HTTP query layer over the trip data provider.
//!
//! The provider is read-only after initialization, so handlers share it via
//! `web::Data` with no locking. Rendering state is request-scoped.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use serde_json::json;
use tracing::{error, info, warn};

use bus_trip_geo::error::NotFoundError;
use bus_trip_geo::provider::TripDataProvider;
use bus_trip_geo::render::render_feature_collection;
use bus_trip_geo::segment::Trip;

pub struct ServerConfig {
    pub port: u16,
    pub allowed_origin: String,
}

async fn ready() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ready" }))
}

async fn get_pub_line_names(provider: web::Data<Arc<TripDataProvider>>) -> HttpResponse {
    HttpResponse::Ok().json(provider.route_names())
}

async fn get_vehicle_refs(provider: web::Data<Arc<TripDataProvider>>) -> HttpResponse {
    HttpResponse::Ok().json(provider.vehicle_refs())
}

async fn get_trips_by_route(
    provider: web::Data<Arc<TripDataProvider>>,
    path: web::Path<String>,
) -> HttpResponse {
    let name = path.into_inner();
    respond_with_trips(provider.trips_for_route(&name), "route", &name)
}

async fn get_trips_by_vehicle(
    provider: web::Data<Arc<TripDataProvider>>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    respond_with_trips(provider.trips_for_vehicle(&id), "vehicle", &id)
}

fn respond_with_trips(
    lookup: Result<&[Arc<Trip>], NotFoundError>,
    kind: &'static str,
    key: &str,
) -> HttpResponse {
    let trips = match lookup {
        Ok(trips) => trips,
        Err(reason) => {
            warn!(kind, key, "query for unknown key");
            return HttpResponse::NotFound().json(json!({ "error": reason.to_string() }));
        }
    };

    match render_feature_collection(trips) {
        Ok(document) => HttpResponse::Ok()
            .content_type("application/json")
            .body(document),
        Err(reason) => {
            // The malformed document stays in the log; the client only
            // learns that rendering failed.
            error!(kind, key, %reason, "GeoJSON rendering failed");
            HttpResponse::InternalServerError()
                .json(json!({ "error": "failed to render trips" }))
        }
    }
}

pub async fn run(provider: Arc<TripDataProvider>, config: ServerConfig) -> std::io::Result<()> {
    let data = web::Data::new(provider);
    let allowed_origin = config.allowed_origin.clone();

    info!(
        port = config.port,
        origin = %config.allowed_origin,
        "starting HTTP server"
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&allowed_origin)
            .allowed_methods(vec!["GET"]);

        App::new()
            .app_data(data.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .route("/ready", web::get().to(ready))
            .route("/getPubLineName", web::get().to(get_pub_line_names))
            .route("/getVehRef", web::get().to(get_vehicle_refs))
            .route(
                "/getBusTripByVehRef/{vehicleRef}",
                web::get().to(get_trips_by_vehicle),
            )
            .route(
                "/getBusTripByPubLineName/{publishedLineName}",
                web::get().to(get_trips_by_route),
            )
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}
