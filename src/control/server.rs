use crate::control::{ControlChannel, ControlCommand};
use actix_cors::Cors;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use log::{error, info};
use std::thread;

#[get("/api/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json("Crawler is running")
}

#[get("/api/status")]
async fn get_status(data: web::Data<ControlChannel>) -> impl Responder {
    HttpResponse::Ok().json(data.control().status())
}

#[post("/api/pause")]
async fn pause_run(data: web::Data<ControlChannel>) -> impl Responder {
    data.dispatch(ControlCommand::Pause);
    HttpResponse::Ok().json("Run paused")
}

#[post("/api/resume")]
async fn resume_run(data: web::Data<ControlChannel>) -> impl Responder {
    data.dispatch(ControlCommand::Resume);
    HttpResponse::Ok().json("Run resumed")
}

#[post("/api/stop")]
async fn stop_run(data: web::Data<ControlChannel>) -> impl Responder {
    data.dispatch(ControlCommand::Stop);
    HttpResponse::Ok().json("Stop requested")
}

#[post("/api/session/ready")]
async fn session_ready(data: web::Data<ControlChannel>) -> impl Responder {
    data.dispatch(ControlCommand::AuthReady);
    HttpResponse::Ok().json("Authentication confirmed")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(get_status)
        .service(pause_run)
        .service(resume_run)
        .service(stop_run)
        .service(session_ready);
}

/// Serves the controller on `127.0.0.1:port` from its own thread and
/// actix system. Bind failures are logged; the crawl runs without it.
pub fn spawn(channel: ControlChannel, port: u16) {
    let state = web::Data::new(channel);
    let spawned = thread::Builder::new()
        .name("control-server".into())
        .spawn(move || {
            let sys = actix_web::rt::System::new();
            let result = sys.block_on(async move {
                let server = HttpServer::new(move || {
                    let cors = Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header();

                    App::new()
                        .wrap(cors)
                        .app_data(state.clone())
                        .configure(configure)
                })
                .workers(1)
                .disable_signals()
                .bind(("127.0.0.1", port))?;

                info!("Control server listening at http://127.0.0.1:{}", port);
                server.run().await
            });
            if let Err(e) = result {
                error!("Control server stopped: {}", e);
            }
        });
    if let Err(e) = spawned {
        error!("Could not start control server thread: {}", e);
    }
}
