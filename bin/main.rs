use log::debug;
use log::info;
use log::warn;

use actix_web::web::Data;
use actix_web::{App, HttpServer};

use slurm_provisioner_bridge::bootstrap::ensure_kernel_descriptor_exists;
use slurm_provisioner_bridge::routes::{self, AppState};
use slurm_provisioner_bridge::settings::Settings;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    debug!("start main");

    let settings = Settings::from_env();

    // Must run before the API is reachable
    let outcome = ensure_kernel_descriptor_exists(&settings)?;
    debug!("bootstrap: {:?}", outcome);

    if settings.allow_unauthenticated && settings.token.is_none() {
        warn!("SLURM_PROVISIONER_ALLOW_UNAUTHENTICATED is set, requests are not authenticated");
    } else if settings.token_generated {
        if let Some(token) = &settings.token {
            info!("JUPYTER_TOKEN is not set, generated token: {}", token);
        }
    }

    let bind = settings.bind.clone();
    let workers = settings.workers;
    let base_url = settings.base_url.clone();

    let state = AppState::new(settings)
        .map(Data::new)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;

    info!(
        "Listening on http://{}{}",
        bind,
        routes::url_path_join(&[base_url.as_str(), routes::API_NAMESPACE, "/"])
    );

    HttpServer::new(move || {
        let base_url = base_url.clone();

        App::new()
            .app_data(state.clone())
            .configure(move |cfg| routes::configure(cfg, &base_url))
    })
    .bind(bind)?
    .workers(workers)
    .run()
    .await
}
