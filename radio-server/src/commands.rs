//! 子命令实现

use anyhow::{Context, Result};
use radio_admin::ArchiveConfig;
use radio_core::{EnumLabel, RadioError, Specialty, Tab, Theme};
use radio_integration::{CaseAnalyst, GeminiProvider, RelayClient, RelayServer, RelayState};
use radio_storage::{FileStore, RecordStore};
use radio_workflow::{statistics, ArchiveEngine, CaseForm, Confirmation, Confirmed, StackViewer};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::AddArgs;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// 在终端中询问确认
struct StdinConfirmation;

impl Confirmation for StdinConfirmation {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [o/N] ", prompt);
        if std::io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "o" | "oui" | "y" | "yes"),
            Err(_) => false,
        }
    }
}

async fn open_engine(config: &ArchiveConfig) -> Result<ArchiveEngine> {
    let store = FileStore::new(&config.storage.data_dir);
    let engine = ArchiveEngine::load(RecordStore::new(Arc::new(store)))
        .await
        .with_context(|| format!("Failed to load archive from {}", config.storage.data_dir))?;
    Ok(engine)
}

fn relay_client(config: &ArchiveConfig) -> RelayClient {
    RelayClient::new(&config.ai.relay_url)
}

/// 目录中的图像文件，按文件名排序
fn images_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Cannot read {}", dir.display()))? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if path.is_file() && is_image {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// 将本地文件转换为 `file://` 图像地址
fn image_urls(paths: &[PathBuf]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|path| {
            let absolute = std::fs::canonicalize(path)
                .with_context(|| format!("Image not found: {}", path.display()))?;
            Ok(format!("file://{}", absolute.display()))
        })
        .collect()
}

pub async fn serve(config: &ArchiveConfig) -> Result<()> {
    info!("启动AI中继服务...");
    info!("  模型: {}", config.ai.model);
    info!("  监听地址: {}", config.listen_addr());

    let api_key = config.api_key().unwrap_or_else(|| {
        warn!("No API key configured; model calls will fail");
        String::new()
    });
    let provider = GeminiProvider::new(&config.ai.provider_endpoint, &config.ai.model, api_key);
    let state = RelayState::new(CaseAnalyst::new(Arc::new(provider)));

    RelayServer::new(state).run(&config.listen_addr()).await
}

pub async fn list(
    config: &ArchiveConfig,
    tab: Tab,
    query: Option<String>,
    smart: bool,
    anonymize: bool,
) -> Result<()> {
    let mut engine = open_engine(config).await?;
    engine.set_tab(tab)?;
    if let Some(query) = query {
        engine.set_query(query);
    }
    if anonymize {
        engine.toggle_anonymized();
    }
    if smart && !engine.semantic_search(&relay_client(config)).await {
        warn!("Semantic search gave no suggestion, showing literal matches only");
    }

    let view = engine.view();
    let badges: Vec<String> = view
        .tab_counts
        .iter()
        .map(|count| format!("{} ({})", count.tab, count.badge(view.show_ratio)))
        .collect();
    println!("{}", badges.join("  "));
    println!();

    if view.rows.is_empty() {
        println!("Aucun cas.");
    }
    for row in &view.rows {
        let case = row.case;
        println!(
            "{} {}  {}  [{} · {} · {}]  {}",
            if row.is_favorite { "★" } else { " " },
            case.id,
            row.display_name,
            case.specialty,
            case.difficulty,
            case.modality,
            case.diagnosis
        );
        if let Some(reason) = row.match_reason {
            println!("      ↳ {}", reason);
        }
    }

    if !view.suggested_keywords.is_empty() {
        println!();
        println!("Mots-clés suggérés: {}", view.suggested_keywords.join(", "));
    }
    Ok(())
}

pub async fn show(config: &ArchiveConfig, id: &str) -> Result<()> {
    let engine = open_engine(config).await?;
    let state = engine.state();
    let case = state
        .case(id)
        .ok_or_else(|| RadioError::NotFound(format!("病例 {}", id)))?;

    println!("{} {} ({})", case.last_name.to_uppercase(), case.first_name, case.patient_id);
    println!("{} · {} · {}", case.specialty, case.difficulty, case.modality);
    println!("Ajouté le {}", case.date_added.format("%d/%m/%Y"));
    if state.is_favorite(id) {
        println!("★ Favori");
    }
    println!();
    println!("Note clinique: {}", case.clinical_note);
    println!("Diagnostic: {}", case.diagnosis);

    let viewer = StackViewer::new(case.series.clone());
    if viewer.is_empty() {
        println!("Aucune image.");
        return Ok(());
    }

    println!();
    for series in viewer.series() {
        println!("{} ({} image(s))", series.name, series.len());
    }
    if let (Some(label), Some(image)) = (viewer.slice_label(), viewer.current_image()) {
        println!("{}: {}", label, image);
    }
    Ok(())
}

pub async fn add(config: &ArchiveConfig, args: AddArgs) -> Result<()> {
    let mut form = CaseForm::new();
    {
        let fields = form.fields_mut();
        fields.last_name = args.last_name;
        fields.first_name = args.first_name;
        fields.patient_id = args.patient_id;
        fields.clinical_note = args.note;
        fields.diagnosis = args.diagnosis.unwrap_or_default();
        if let Some(specialty) = args.specialty {
            fields.specialty = specialty;
        }
        if let Some(difficulty) = args.difficulty {
            fields.difficulty = difficulty;
        }
        if let Some(modality) = args.modality {
            fields.modality = modality;
        }
    }

    if !args.images.is_empty() {
        form.add_series(image_urls(&args.images)?);
    }
    if let Some(dir) = &args.image_dir {
        if !form.add_series(image_urls(&images_in_dir(dir)?)?) {
            warn!("No image found in {}", dir.display());
        }
    }

    if args.analyze && !form.analyze(&relay_client(config)).await {
        warn!("AI analysis gave no suggestion, keeping the entered values");
    }

    let fields = form.submit()?;
    let mut engine = open_engine(config).await?;
    let case = engine.create_case(fields).await?;
    println!("{}", case.id);
    Ok(())
}

pub async fn delete(config: &ArchiveConfig, id: &str, yes: bool) -> Result<()> {
    let mut engine = open_engine(config).await?;
    let confirmation: &dyn Confirmation = if yes { &Confirmed } else { &StdinConfirmation };

    if engine.delete_case(id, confirmation).await? {
        println!("Cas supprimé.");
    } else {
        println!("Suppression annulée.");
    }
    Ok(())
}

pub async fn favorite(config: &ArchiveConfig, id: &str) -> Result<()> {
    let mut engine = open_engine(config).await?;
    if engine.toggle_favorite(id).await? {
        println!("Ajouté aux favoris.");
    } else {
        println!("Retiré des favoris.");
    }
    Ok(())
}

pub async fn stats(config: &ArchiveConfig) -> Result<()> {
    let engine = open_engine(config).await?;
    let stats = statistics(engine.state().cases());

    println!("Total: {}", stats.total);
    print_distribution("Spécialités", &stats.specialty);
    print_distribution("Difficulté", &stats.difficulty);
    print_distribution("Modalités", &stats.modality);
    Ok(())
}

fn print_distribution<T: EnumLabel>(title: &str, counts: &[(T, usize)]) {
    println!();
    println!("{}:", title);
    for (member, count) in counts {
        println!("  {:<20} {}", member.label(), count);
    }
}

pub async fn specialty(config: &ArchiveConfig, specialty: Specialty) -> Result<()> {
    let mut engine = open_engine(config).await?;
    if engine.toggle_specialty_visibility(specialty).await? {
        println!("{}: onglet affiché.", specialty);
    } else {
        println!("{}: onglet masqué.", specialty);
    }
    Ok(())
}

pub async fn theme(config: &ArchiveConfig, theme: Option<Theme>) -> Result<()> {
    let mut engine = open_engine(config).await?;
    let theme = match theme {
        Some(theme) => {
            engine.set_theme(theme).await?;
            theme
        }
        None => engine.toggle_theme().await?,
    };
    println!("Thème: {:?}", theme);
    Ok(())
}
