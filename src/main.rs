//! versevox - 章节语音合成
//!
//! 分段 -> 会话池流式合成 -> 完整性校验

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use versevox::application::{
    ChapterFailure, ResetArtifacts, ResetArtifactsHandler, SegmentDispatchPort, SplitChapters,
    SplitChaptersHandler, SplitChaptersResponse, SynthesisServicePort, SynthesizeSegments,
    SynthesizeSegmentsHandler, SynthesizeSegmentsResponse, VerifyChapters, VerifyChaptersHandler,
    VerifyChaptersResponse,
};
use versevox::cli::{ChapterFilter, Cli, Commands};
use versevox::config::{load_config_from_path, print_config, AppConfig, LogConfig, SynthesisProvider};
use versevox::infrastructure::adapters::{
    FakeSynthesisService, FileArtifactStore, FileChapterSource, FileSegmentStore,
    LiveSynthesisClient,
};
use versevox::infrastructure::worker::{SessionPoolDispatcher, StreamingAdapter};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config_from_path(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config.log, cli.log_level_override());

    tracing::info!("versevox - chapter speech synthesis");
    print_config(&config);

    let segment_store = Arc::new(FileSegmentStore::new(&config.paths.segments_dir));
    let artifact_store = Arc::new(FileArtifactStore::new(&config.paths.audio_dir));

    let split_handler = SplitChaptersHandler::new(
        Arc::new(FileChapterSource::new(&config.paths.input_dir)),
        segment_store.clone(),
        artifact_store.clone(),
        config.chunker.chunker_config(),
    );
    let verify_handler = VerifyChaptersHandler::new(
        segment_store.clone(),
        artifact_store.clone(),
        config.assembly.write_order_list,
    );

    let success = match cli.command {
        Commands::Split(filter) => {
            let response = split_handler.handle(split_command(&filter)).await?;
            print_split(&response);
            response.failed.is_empty()
        }
        Commands::Synthesize(filter) => {
            let handler = SynthesizeSegmentsHandler::new(
                segment_store.clone(),
                artifact_store.clone(),
                build_dispatcher(&config, artifact_store.clone())?,
            );
            let response = handler
                .handle(synthesize_command(&filter), shutdown_token())
                .await?;
            print_dispatch(&response);
            !response.has_failures()
        }
        Commands::Verify(filter) => {
            let response = verify_handler.handle(verify_query(&filter)).await?;
            print_assembly(&response);
            response.is_complete()
        }
        Commands::Run(filter) => {
            let split = split_handler.handle(split_command(&filter)).await?;
            print_split(&split);

            let handler = SynthesizeSegmentsHandler::new(
                segment_store.clone(),
                artifact_store.clone(),
                build_dispatcher(&config, artifact_store.clone())?,
            );
            let synthesized = handler
                .handle(synthesize_command(&filter), shutdown_token())
                .await?;
            print_dispatch(&synthesized);

            let verified = verify_handler.handle(verify_query(&filter)).await?;
            print_assembly(&verified);

            split.failed.is_empty() && !synthesized.has_failures() && verified.failed.is_empty()
        }
        Commands::Reset { chapter, indices } => {
            let handler = ResetArtifactsHandler::new(artifact_store.clone());
            let response = handler.handle(ResetArtifacts { chapter, indices }).await?;
            println!(
                "{}: deleted {} artifact(s) {:?}",
                response.chapter,
                response.deleted.len(),
                response.deleted
            );
            true
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// 初始化日志（RUST_LOG > -v > log.level）
fn init_tracing(log: &LogConfig, level_override: Option<&str>) {
    let level = level_override.unwrap_or(&log.level);
    let log_filter = format!("{},versevox={}", level, level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .with_writer(std::io::stderr);

    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// 按配置组装会话池分发器
fn build_dispatcher(
    config: &AppConfig,
    artifact_store: Arc<FileArtifactStore>,
) -> anyhow::Result<Arc<dyn SegmentDispatchPort>> {
    let service: Arc<dyn SynthesisServicePort> = match config.synthesis.provider {
        SynthesisProvider::Live => Arc::new(
            LiveSynthesisClient::new(config.synthesis.live_client_config())
                .map_err(|e| anyhow::anyhow!("Failed to create synthesis client: {}", e))?,
        ),
        SynthesisProvider::Fake => {
            tracing::warn!("Using fake synthesis service, audio will be silent");
            Arc::new(FakeSynthesisService::new(config.synthesis.fake_config()))
        }
    };

    let adapter = StreamingAdapter::new(config.adapter_config(), service, artifact_store);
    Ok(Arc::new(SessionPoolDispatcher::new(
        config.dispatch.pool_config(),
        Arc::new(adapter),
    )))
}

/// Ctrl-C 时取消分发
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            return;
        }
        tracing::warn!("Received shutdown signal, cancelling remaining segments");
        trigger.cancel();
    });
    token
}

fn split_command(filter: &ChapterFilter) -> SplitChapters {
    SplitChapters {
        chapters: filter.chapters.clone(),
    }
}

fn synthesize_command(filter: &ChapterFilter) -> SynthesizeSegments {
    SynthesizeSegments {
        chapters: filter.chapters.clone(),
    }
}

fn verify_query(filter: &ChapterFilter) -> VerifyChapters {
    VerifyChapters {
        chapters: filter.chapters.clone(),
    }
}

fn print_split(response: &SplitChaptersResponse) {
    for chapter in &response.split {
        println!(
            "{}: {} verses -> {} segments",
            chapter.chapter, chapter.verses, chapter.segments
        );
        if !chapter.stale.is_empty() {
            println!("{}: removed stale audio {:?}", chapter.chapter, chapter.stale);
        }
    }
    print_failures("split", &response.failed);
    println!(
        "split {} chapter(s), {} segment(s), {} failure(s)",
        response.split.len(),
        response.total_segments(),
        response.failed.len()
    );
}

fn print_failures(stage: &str, failed: &[ChapterFailure]) {
    for failure in failed {
        println!("{}: {} failed: {}", failure.chapter, stage, failure.error);
    }
}

fn print_dispatch(response: &SynthesizeSegmentsResponse) {
    let report = &response.report;
    for (chapter, summary) in report.by_chapter() {
        println!(
            "{}: {} completed, {} recovered after retry, {} permanently failed {:?}{}",
            chapter,
            summary.completed,
            summary.recovered,
            summary.permanently_failed.len(),
            summary.permanently_failed,
            if summary.cancelled > 0 {
                format!(", {} cancelled", summary.cancelled)
            } else {
                String::new()
            }
        );
    }
    println!(
        "synthesized {} segment(s), peak {} concurrent session(s)",
        report.outcomes.len(),
        report.peak_in_flight
    );
    print_failures("synthesize", &response.failed);
}

fn print_assembly(response: &VerifyChaptersResponse) {
    for report in &response.reports {
        if report.is_complete() {
            println!("{}: complete ({} segments)", report.chapter, report.expected);
        } else {
            println!(
                "{}: {}/{} present, missing {:?}",
                report.chapter, report.present, report.expected, report.missing
            );
        }
        if !report.orphaned.is_empty() {
            println!("{}: orphaned artifacts {:?}", report.chapter, report.orphaned);
        }
    }
    print_failures("verify", &response.failed);
}
