//! RadioArchive 演示程序
//!
//! 展示归档的核心流程：
//! - 表单填写、AI 建议合并与病例创建
//! - 检索、标签页计数与统计
//! - 影像栈浏览

use anyhow::Result;
use radioarchive::model::{CaseClassification, CaseFields, Modality, Series, Specialty, Tab};
use radioarchive::open_in_memory;
use radioarchive::workflow::{ArchiveEngine, CaseForm, StackViewer, ViewerEvent};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("🚀 启动RadioArchive演示");

    let mut engine = open_in_memory().await?;

    demo_form(&mut engine).await?;
    demo_catalog(&mut engine).await?;
    demo_viewer(&engine);

    info!("✅ 演示完成");
    Ok(())
}

/// 表单与 AI 建议演示
async fn demo_form(engine: &mut ArchiveEngine) -> Result<()> {
    info!("📝 病例表单");

    let mut form = CaseForm::new();
    {
        let fields = form.fields_mut();
        fields.last_name = "Martin".into();
        fields.first_name = "Claire".into();
        fields.patient_id = "IPP-2024-001".into();
        fields.clinical_note = "Céphalées brutales, raideur de nuque".into();
    }
    form.add_series((1..=12).map(|i| format!("file:///demo/axial/{:03}.png", i)).collect());
    form.add_series((1..=4).map(|i| format!("file:///demo/sagittal/{:03}.png", i)).collect());

    // 模型给出的自由文本建议，按枚举做模糊匹配
    form.apply_classification(&CaseClassification {
        specialty: "neuro quelque chose".into(),
        difficulty: "avancé".into(),
        summary: "Hémorragie sous-arachnoïdienne".into(),
    });
    info!(
        "   建议合并后: {} / {} / {}",
        form.fields().specialty,
        form.fields().difficulty,
        form.fields().diagnosis
    );

    let case = engine.create_case(form.submit()?).await?;
    info!("   已创建病例 {}", case.id);

    for (last_name, specialty, diagnosis) in [
        ("Durand", Specialty::Thoracic, "Embolie pulmonaire"),
        ("Petit", Specialty::Abdominal, "Appendicite aiguë"),
    ] {
        let fields = CaseFields {
            patient_id: format!("IPP-{}", last_name.to_lowercase()),
            last_name: last_name.into(),
            first_name: "Paul".into(),
            specialty,
            modality: Modality::Ct,
            clinical_note: "Douleur aiguë".into(),
            diagnosis: diagnosis.into(),
            ..CaseFields::default()
        };
        engine.create_case(fields).await?;
    }

    Ok(())
}

/// 目录检索演示
async fn demo_catalog(engine: &mut ArchiveEngine) -> Result<()> {
    info!("📋 病例目录");

    let first_id = engine.state().cases()[0].id.clone();
    engine.toggle_favorite(&first_id).await?;
    engine.set_query("embolie");
    engine.toggle_anonymized();

    let view = engine.view();
    for count in &view.tab_counts {
        info!("   {} ({})", count.tab, count.badge(view.show_ratio));
    }
    for row in &view.rows {
        info!("   {} - {}", row.display_name, row.case.diagnosis);
    }
    info!("   统计: {}", serde_json::to_string(&view.statistics)?);

    engine.set_query("");
    engine.set_tab(Tab::Favorites)?;
    info!("   收藏: {} 个病例", engine.view().rows.len());

    Ok(())
}

/// 影像栈浏览演示
fn demo_viewer(engine: &ArchiveEngine) {
    info!("🩻 影像浏览");

    let series: Vec<Series> = engine
        .state()
        .cases()
        .iter()
        .flat_map(|case| case.series.clone())
        .collect();
    let mut viewer = StackViewer::new(series);

    for _ in 0..5 {
        viewer.handle(ViewerEvent::Wheel {
            delta_y: 100.0,
            modifier: false,
        });
    }
    viewer.handle(ViewerEvent::Wheel {
        delta_y: -250.0,
        modifier: true,
    });
    viewer.handle(ViewerEvent::EnterFullscreen);

    info!(
        "   {} {:?}, 显示倍数 {:.2}",
        viewer.active_series().map(|s| s.name.as_str()).unwrap_or("-"),
        viewer.slice_label(),
        viewer.display_scale()
    );

    viewer.handle(ViewerEvent::SelectSeries(1));
    info!("   切换序列后: {:?}", viewer.slice_label());
}
