use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use songfetch::{
    Config, JsonLibrary, LibraryStore, SavedTrack, TrackOrchestrator, YtDlpProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("songfetch=debug".parse()?),
        )
        .init();

    info!("🎵 Iniciando songfetch v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    let args: Vec<String> = std::env::args().skip(1).collect();

    let provider = Arc::new(YtDlpProvider::new(config.ytdlp_bin.clone()));
    let library = JsonLibrary::open(config.data_dir.clone()).await?;
    let orchestrator = TrackOrchestrator::new(provider, config);

    // Barrido periódico mientras el proceso viva
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(orchestrator.sweeper().run(shutdown.clone()));

    let result = match args.split_first() {
        Some((cmd, rest)) if cmd == "search" && !rest.is_empty() => {
            run_search(&orchestrator, &rest.join(" ")).await
        }
        Some((cmd, rest)) if cmd == "fetch" && !rest.is_empty() => {
            let url = &rest[0];
            let user = rest.get(1).map(String::as_str).unwrap_or("cli");
            run_fetch(&orchestrator, &library, url, user).await
        }
        _ => {
            print_usage();
            Ok(())
        }
    };

    shutdown.cancel();
    let _ = sweeper.await;

    result
}

async fn run_search(orchestrator: &TrackOrchestrator, query: &str) -> Result<()> {
    let hits = orchestrator.search(query).await?;

    for (index, hit) in hits.iter().enumerate() {
        let duration = hit
            .duration_seconds
            .map(|secs| format!("{}:{:02}", secs / 60, secs % 60))
            .unwrap_or_else(|| "?:??".to_string());
        println!(
            "{:2}. [{}] {} ({})",
            index + 1,
            duration,
            hit.title,
            hit.uploader.as_deref().unwrap_or("desconocido"),
        );
        println!("    {}", hit.source_url);
    }

    Ok(())
}

async fn run_fetch(
    orchestrator: &TrackOrchestrator,
    library: &JsonLibrary,
    url: &str,
    user: &str,
) -> Result<()> {
    let track = orchestrator.download(url, user).await?;

    // Arrendar el archivo mientras se registra en la librería
    let _lease = orchestrator.lease_file(&track.local_file_path);
    library
        .save_track(user, &SavedTrack::from_download(&track))
        .await?;

    println!(
        "{} [{}] {:.2} MB",
        track.public_file_url,
        track.status.as_str(),
        track.size_megabytes,
    );

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    // Verificar dependencias críticas
    let provider = YtDlpProvider::new(config.ytdlp_bin.clone());
    let version = provider.version().await?;
    info!("yt-dlp {}", version);

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if !ffmpeg.status.success() {
        anyhow::bail!("Dependencias faltantes");
    }

    println!("OK");
    Ok(())
}

fn print_usage() {
    println!("Uso: songfetch <comando>");
    println!();
    println!("Comandos:");
    println!("  search <consulta...>   Busca pistas y lista los resultados");
    println!("  fetch <url> [usuario]  Descarga una pista y la guarda en la librería");
    println!("  --health-check         Verifica yt-dlp y ffmpeg");
}
