mod common;

use common::{shared, RecordingSleeper, StubClient};
use sheet_translate::models::BilingualSheet;
use sheet_translate::orchestrator::SheetOutcome;
use sheet_translate::{App, CellTranslationError, Config};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio_test::assert_ok;

fn workspace_config(root: &Path) -> Config {
    let input = root.join("input");
    fs::create_dir_all(&input).unwrap();
    Config {
        input_dir: input.to_string_lossy().to_string(),
        output_dir: root.join("output").to_string_lossy().to_string(),
        cache_dir: root.join("cache").to_string_lossy().to_string(),
        output_log_file: root.join("output.txt").to_string_lossy().to_string(),
        failure_report_file: root.join("failed_cells.txt").to_string_lossy().to_string(),
        ..Default::default()
    }
}

fn write_file(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

#[tokio::test]
async fn test_translates_sheet_with_glossary_and_archives_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = workspace_config(dir.path());

    let glossary = dir.path().join("glossary.csv");
    write_file(&glossary, "中文,英文\n服务器,server\n,\n");
    config.glossary_file = Some(glossary.to_string_lossy().to_string());

    write_file(
        &Path::new(&config.input_dir).join("manual.csv"),
        "中文,英文\n请检查服务器状态,\n你好,Hello\n服务器,\n,\n",
    );

    let client = shared(StubClient::new());
    let app = assert_ok!(
        App::with_client(config.clone(), client.clone(), shared(RecordingSleeper::default()))
            .await
    );
    let summary = assert_ok!(app.run().await);

    assert_eq!(summary.total, 1);
    assert_eq!(summary.success, 1);
    // “服务器”整段被术语替换，不需要调用接口
    assert_eq!(client.requested(), vec!["请检查server状态".to_string()]);

    let output = Path::new(&config.output_dir).join("manual_translated.csv");
    let sheet = BilingualSheet::load(&output, None).await.unwrap();
    assert_eq!(sheet.cell(0, 1), Some("EN(请检查server状态)"));
    assert_eq!(sheet.cell(1, 1), Some("Hello"));
    assert_eq!(sheet.cell(2, 1), Some("server"));
    assert_eq!(sheet.cell(3, 1), Some(""));

    let cache_dir = Path::new(&config.cache_dir);
    assert!(cache_dir.join("manual.checkpoint.done.json").exists());
    assert!(!cache_dir.join("manual.checkpoint.json").exists());
    assert!(cache_dir.join("translation_cache.jsonl").exists());
}

#[tokio::test]
async fn test_second_run_served_from_shared_cache_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace_config(dir.path());
    write_file(
        &Path::new(&config.input_dir).join("a.csv"),
        "English,Chinese\nCheck the server,\nRestart,\n",
    );

    let first = shared(StubClient::new());
    {
        let app = assert_ok!(
            App::with_client(config.clone(), first.clone(), shared(RecordingSleeper::default()))
                .await
        );
        assert_ok!(app.run().await);
    }
    assert_eq!(first.calls(), 2);

    // 新进程：缓存文件重新加载
    let second = shared(StubClient::new());
    let app = assert_ok!(
        App::with_client(config.clone(), second.clone(), shared(RecordingSleeper::default()))
            .await
    );
    let outcome = assert_ok!(
        app.process_sheet(&Path::new(&config.input_dir).join("a.csv"), 1, 1)
            .await
    );

    assert_eq!(second.calls(), 0);
    match outcome {
        SheetOutcome::Completed { report, .. } => {
            assert_eq!(report.cached, 2);
            assert_eq!(report.outputs[0].text, "EN(Check the server)");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_cells_reported_and_checkpoint_kept() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        max_attempts: 2,
        ..workspace_config(dir.path())
    };
    write_file(
        &Path::new(&config.input_dir).join("b.csv"),
        "中文,英文\n你好,\n再见,\n",
    );

    let client = shared(StubClient::responding(|text, _| {
        if text == "再见" {
            Err(CellTranslationError::transient("HTTP 503"))
        } else {
            Ok(format!("EN({})", text))
        }
    }));
    let sleeper = shared(RecordingSleeper::default());
    let app = assert_ok!(App::with_client(config.clone(), client.clone(), sleeper.clone()).await);
    let summary = assert_ok!(app.run().await);

    assert_eq!(summary.failed, 1);
    assert_eq!(client.calls_for("再见"), 2);
    assert_eq!(sleeper.waits().len(), 1);

    let report = fs::read_to_string(&config.failure_report_file).unwrap();
    assert!(report.contains("单元格 b!R1C0"));
    assert!(report.contains("HTTP 503"));

    assert!(Path::new(&config.cache_dir)
        .join("b.checkpoint.json")
        .exists());

    let output = Path::new(&config.output_dir).join("b_translated.csv");
    let sheet = BilingualSheet::load(&output, None).await.unwrap();
    assert_eq!(sheet.cell(0, 1), Some("EN(你好)"));
    assert_eq!(sheet.cell(1, 1), Some("[翻译失败: HTTP 503]"));
}

#[tokio::test]
async fn test_invalid_glossary_rejected_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = workspace_config(dir.path());

    let glossary = dir.path().join("glossary.csv");
    write_file(&glossary, "中文,英文\n服务器,server\n服务器,host\n");
    config.glossary_file = Some(glossary.to_string_lossy().to_string());

    let result = App::with_client(
        config,
        shared(StubClient::new()),
        shared(RecordingSleeper::default()),
    )
    .await;

    let err = result.err().expect("duplicate term must be rejected");
    assert!(err.to_string().contains("重复"));
}

#[tokio::test]
async fn test_many_to_one_glossary_serves_both_directions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = workspace_config(dir.path());

    let glossary = dir.path().join("glossary.csv");
    write_file(&glossary, "中文,英文\n服务器,server\n伺服器,server\n");
    config.glossary_file = Some(glossary.to_string_lossy().to_string());

    let input = Path::new(&config.input_dir);
    write_file(&input.join("a.csv"), "中文,英文\n重启伺服器,\n");
    write_file(&input.join("b.csv"), "English,中文\nCheck the server,\n");

    let client = shared(StubClient::new());
    let app = assert_ok!(
        App::with_client(config.clone(), client.clone(), shared(RecordingSleeper::default()))
            .await
    );
    let summary = assert_ok!(app.run().await);

    assert_eq!(summary.total, 2);
    assert_eq!(summary.success, 2);
    assert_eq!(
        client.requested(),
        vec!["Check the 服务器".to_string(), "重启server".to_string()]
    );

    let output = Path::new(&config.output_dir).join("b_translated.csv");
    let sheet = BilingualSheet::load(&output, None).await.unwrap();
    assert_eq!(sheet.cell(0, 1), Some("EN(Check the 服务器)"));
}

#[tokio::test]
async fn test_signal_setup_error_does_not_interrupt() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace_config(dir.path());
    let sheet = Path::new(&config.input_dir).join("c.csv");
    write_file(&sheet, "中文,英文\n你好,\n");

    let app = assert_ok!(
        App::with_client(
            config.clone(),
            shared(StubClient::new().delay("你好", Duration::from_millis(50))),
            shared(RecordingSleeper::default()),
        )
        .await
    );
    let outcome = assert_ok!(
        app.process_sheet_until(&sheet, 1, 1, async {
            Err(std::io::Error::other("signal handler unavailable"))
        })
        .await
    );

    assert!(matches!(outcome, SheetOutcome::Completed { .. }));
    assert!(Path::new(&config.output_dir).join("c_translated.csv").exists());
}

#[tokio::test]
async fn test_interrupt_saves_progress_and_next_run_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        flush_every_cells: 100,
        ..workspace_config(dir.path())
    };
    let sheet = Path::new(&config.input_dir).join("d.csv");
    write_file(&sheet, "中文,英文\n你好,\n再见,\n");

    let first = shared(StubClient::new().hang_on("再见"));
    {
        let app = assert_ok!(
            App::with_client(config.clone(), first.clone(), shared(RecordingSleeper::default()))
                .await
        );
        let outcome = assert_ok!(
            app.process_sheet_until(&sheet, 1, 1, async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await
        );
        match outcome {
            SheetOutcome::Interrupted { job_id } => assert_eq!(job_id, "d"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
    assert!(!Path::new(&config.output_dir).join("d_translated.csv").exists());

    let second = shared(StubClient::new());
    let app = assert_ok!(
        App::with_client(config.clone(), second.clone(), shared(RecordingSleeper::default()))
            .await
    );
    assert_ok!(app.process_sheet(&sheet, 1, 1).await);

    assert_eq!(second.calls_for("你好"), 0);
    assert_eq!(second.calls_for("再见"), 1);
}
