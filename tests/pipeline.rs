//! Integration tests for the conversion pipeline, run against scripted
//! engines. No external binaries or pdfium are needed.
//!
//! Run with:
//!   cargo test --test pipeline

mod common;

use common::{CountingObserver, FakeLibrary, FakeOcr, Harness, ScriptedRunner, ENCRYPTED_PDF};
use edgequake_docconv::{
    normalize, AttemptOutcome, CancelToken, ConversionForm, ConversionOptions, ConversionRequest,
    ConversionStatus, ConvertError, ErrorKind, FailureDescriptor, Format, PageRange, UploadedFile,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn form(output: &str) -> ConversionForm {
    ConversionForm {
        output_format: Some(output.into()),
        ..Default::default()
    }
}

fn request(name: &str, bytes: &[u8], target: Format, options: ConversionOptions) -> ConversionRequest {
    ConversionRequest::new(UploadedFile::new(name, bytes.to_vec()), None, target, options).unwrap()
}

// ── Office documents ─────────────────────────────────────────────────────────

#[tokio::test]
async fn docx_to_pdf_through_office_engine() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("libreoffice"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(1)), &Arc::default());

    let req = request("sample.docx", b"PK\x03\x04", Format::Pdf, ConversionOptions::default());
    let id = req.correlation_id.clone();
    let result = converter.convert(req).await.unwrap();

    assert!(result.success);
    assert_eq!(result.status, ConversionStatus::Success);
    assert_eq!(result.strategy, "libreoffice");
    assert_eq!(result.original_name, "sample.docx");
    assert_eq!(result.source_format, Format::Docx);
    assert_eq!(result.file_name, format!("{id}-output.pdf"));
    assert!(result.file_url.ends_with(&result.file_name));
    assert!(result.output_path.starts_with(&h.config.output_dir));
    assert!(std::fs::metadata(&result.output_path).unwrap().len() > 0);

    // in-process declined first, then libreoffice won.
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.attempts[0].strategy, "in-process");
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::Failure);
    assert_eq!(result.attempts[1].outcome, AttemptOutcome::Success);
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn falls_back_to_soffice_when_libreoffice_missing() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("soffice"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(1)), &Arc::default());

    let result = converter
        .convert(request("deck.pptx", b"PK", Format::Pdf, ConversionOptions::default()))
        .await
        .unwrap();

    assert_eq!(result.strategy, "soffice");
    let programs = runner.programs();
    assert!(programs.contains(&"libreoffice".to_string()));
    assert_eq!(programs.last().map(String::as_str), Some("soffice"));
}

#[tokio::test]
async fn exhausted_chain_is_conversion_failed() {
    let h = Harness::new();
    let observer = Arc::new(CountingObserver::default());
    let converter = h
        .converter(
            &Arc::new(ScriptedRunner::new()),
            &Arc::new(FakeLibrary::new(1)),
            &Arc::default(),
        )
        .with_observer(observer.clone());

    let err = converter
        .convert(request("letter.rtf", b"{\\rtf1}", Format::Docx, ConversionOptions::default()))
        .await
        .unwrap_err();

    match &err {
        ConvertError::ConversionFailed {
            file,
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(file, "letter.rtf");
            assert!(*attempts >= 3);
            assert_eq!(*attempts, observer.failures.load(Ordering::SeqCst));
            assert!(last_error.contains("soffice"), "got: {last_error}");
        }
        other => panic!("expected ConversionFailed, got {other:?}"),
    }
    assert_eq!(observer.completions.load(Ordering::SeqCst), 1);
    assert_eq!(h.leftover_workspaces(), 0);
    assert!(!h.config.output_dir.exists() || std::fs::read_dir(&h.config.output_dir).unwrap().count() == 0);

    let failure = FailureDescriptor::from(&err);
    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["kind"], "conversion_failed");
}

// ── Request validation ───────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_extension_is_invalid_format() {
    let err = normalize(UploadedFile::new("data.xyz", b"???".to_vec()), &form("pdf")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    assert!(err.to_string().contains("data.xyz"));
}

// ── PDF text extraction ──────────────────────────────────────────────────────

#[tokio::test]
async fn scanned_pdf_falls_through_to_ocr() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("pdftotext").pdftotext_text("\x0c\x0c"));
    let library = Arc::new(FakeLibrary::new(2).with_text("\x0c \n"));
    let ocr = Arc::new(FakeOcr::default());
    let converter = h.converter(&runner, &library, &ocr);

    let options = ConversionOptions {
        ocr: true,
        ..Default::default()
    };
    let result = converter
        .convert(request("scanned.pdf", b"%PDF-1.7", Format::Txt, options))
        .await
        .unwrap();

    assert_eq!(result.strategy, "ocr");
    assert_eq!(result.status, ConversionStatus::Success);
    let names: Vec<_> = result.attempts.iter().map(|a| a.strategy.as_str()).collect();
    assert_eq!(names, ["pdftotext", "pdfium-text", "ocr"]);
    assert_eq!(
        result.attempts[0].error_kind,
        Some(ErrorKind::ArtifactMissing)
    );

    let text = std::fs::read_to_string(&result.output_path).unwrap();
    assert!(text.contains("Recognised text from page-1.png"));
    assert!(text.contains("Recognised text from page-2.png"));
    assert_eq!(ocr.workers.load(Ordering::SeqCst), 1);
    assert_eq!(ocr.terminated.load(Ordering::SeqCst), 1);
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn scanned_pdf_without_ocr_gets_text_placeholder() {
    let h = Harness::new();
    let ocr = Arc::new(FakeOcr::default());
    let converter = h.converter(
        &Arc::new(ScriptedRunner::new()),
        &Arc::new(FakeLibrary::new(3)),
        &ocr,
    );

    let result = converter
        .convert(request("scan.pdf", b"%PDF", Format::Txt, ConversionOptions::default()))
        .await
        .unwrap();

    assert_eq!(result.status, ConversionStatus::Degraded);
    assert_eq!(result.strategy, "text-placeholder");
    let text = std::fs::read_to_string(&result.output_path).unwrap();
    assert!(text.starts_with("Extracted from PDF (3 pages)"));
    assert_eq!(ocr.workers.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn text_layer_pdf_uses_pdftotext() {
    let h = Harness::new();
    let runner = Arc::new(
        ScriptedRunner::new()
            .install("pdftotext")
            .pdftotext_text("Quarterly revenue grew 12%\x0c"),
    );
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(1)), &Arc::default());

    let result = converter
        .convert(request("report.pdf", b"%PDF", Format::Txt, ConversionOptions::default()))
        .await
        .unwrap();

    assert_eq!(result.strategy, "pdftotext");
    let text = std::fs::read_to_string(&result.output_path).unwrap();
    assert!(text.contains("Quarterly revenue grew 12%"));
}

// ── PDF to spreadsheet ───────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_to_xlsx_degrades_to_placeholder() {
    let h = Harness::new();
    let converter = h.converter(
        &Arc::new(ScriptedRunner::new()),
        &Arc::new(FakeLibrary::new(1)),
        &Arc::default(),
    );

    let result = converter
        .convert(request("report.pdf", b"%PDF", Format::Xlsx, ConversionOptions::default()))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.status, ConversionStatus::Degraded);
    assert_eq!(result.strategy, "spreadsheet-placeholder");
    assert!(result
        .attempts
        .iter()
        .take(result.attempts.len() - 1)
        .all(|a| a.outcome == AttemptOutcome::Failure));

    let bytes = std::fs::read(&result.output_path).unwrap();
    assert!(bytes.starts_with(b"PK"), "xlsx must be a zip container");
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "degraded");
}

#[tokio::test]
async fn pdf_to_xlsx_without_placeholder_fails() {
    let mut h = Harness::new();
    h.config.spreadsheet_placeholder = false;
    let converter = h.converter(
        &Arc::new(ScriptedRunner::new()),
        &Arc::new(FakeLibrary::new(1)),
        &Arc::default(),
    );

    let err = converter
        .convert(request("report.pdf", b"%PDF", Format::Xlsx, ConversionOptions::default()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConversionFailed);
}

#[tokio::test]
async fn pdf_to_xlsx_via_office_engine() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("libreoffice"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(1)), &Arc::default());

    let result = converter
        .convert(request("report.pdf", b"%PDF", Format::Xlsx, ConversionOptions::default()))
        .await
        .unwrap();

    // pdftotext is missing, so the html bridge is the first to succeed.
    assert_eq!(result.strategy, "html-bridge");
    assert_eq!(result.status, ConversionStatus::Success);
}

// ── Encrypted PDFs ───────────────────────────────────────────────────────────

fn with_password(password: &str) -> ConversionOptions {
    ConversionOptions {
        password: Some(password.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn wrong_password_fails_before_any_attempt() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("pdftotext").install("qpdf"));
    let library = Arc::new(FakeLibrary::new(1).encrypted("secret"));
    let observer = Arc::new(CountingObserver::default());
    let converter = h
        .converter(&runner, &library, &Arc::default())
        .with_observer(observer.clone());

    let err = converter
        .convert(request("locked.pdf", ENCRYPTED_PDF, Format::Txt, with_password("guess")))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
    assert!(err.to_string().contains("locked.pdf"));
    assert!(err.to_string().contains("wrong password"), "got: {err}");
    assert_eq!(observer.starts.load(Ordering::SeqCst), 0);
    assert!(runner.programs().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn missing_password_fails_without_decrypting() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("qpdf"));
    let library = Arc::new(FakeLibrary::new(1).encrypted("secret"));
    let converter = h.converter(&runner, &library, &Arc::default());

    let err = converter
        .convert(request("locked.pdf", ENCRYPTED_PDF, Format::Docx, ConversionOptions::default()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
    assert!(runner.calls_to("qpdf").is_empty());
}

#[tokio::test]
async fn correct_password_converts_decrypted_copy() {
    let h = Harness::new();
    let runner = Arc::new(
        ScriptedRunner::new()
            .install("qpdf")
            .install("pdftotext")
            .pdftotext_text("Payroll"),
    );
    let library = Arc::new(FakeLibrary::new(1).encrypted("secret"));
    let converter = h.converter(&runner, &library, &Arc::default());

    let result = converter
        .convert(request("locked.pdf", ENCRYPTED_PDF, Format::Txt, with_password("secret")))
        .await
        .unwrap();

    assert_eq!(result.strategy, "pdftotext");
    assert_eq!(result.original_name, "locked.pdf");
    assert_eq!(runner.programs(), ["qpdf", "pdftotext"]);

    let qpdf = &runner.calls_to("qpdf")[0];
    let args = qpdf.args_lossy();
    assert_eq!(args[..2], ["--decrypt", "--password=secret"]);
    assert!(args[2].ends_with("locked.pdf"), "got: {args:?}");
    assert!(args[3].ends_with("locked-decrypted.pdf"), "got: {args:?}");

    let pdftotext = &runner.calls_to("pdftotext")[0];
    assert_eq!(pdftotext.args_lossy()[0], args[3]);
}

#[tokio::test]
async fn copy_that_stays_encrypted_is_rejected() {
    let h = Harness::new();
    let runner = Arc::new(
        ScriptedRunner::new()
            .install("qpdf")
            .install("pdftotext")
            .qpdf_keeps_encryption(),
    );
    let library = Arc::new(FakeLibrary::new(1).encrypted("secret"));
    let observer = Arc::new(CountingObserver::default());
    let converter = h
        .converter(&runner, &library, &Arc::default())
        .with_observer(observer.clone());

    let err = converter
        .convert(request("locked.pdf", ENCRYPTED_PDF, Format::Txt, with_password("secret")))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
    assert!(err.to_string().contains("still encrypted"), "got: {err}");
    assert_eq!(observer.starts.load(Ordering::SeqCst), 0);
    assert!(runner.calls_to("pdftotext").is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn missing_qpdf_is_decryption_failure() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("pdftotext"));
    let library = Arc::new(FakeLibrary::new(1).encrypted("secret"));
    let converter = h.converter(&runner, &library, &Arc::default());

    let err = converter
        .convert(request("locked.pdf", ENCRYPTED_PDF, Format::Txt, with_password("secret")))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DecryptionFailed);
    assert!(err.to_string().contains("qpdf"), "got: {err}");
    assert!(err.is_request_error());
}

// ── Raster output ────────────────────────────────────────────────────────────

#[tokio::test]
async fn docx_to_png_bridges_through_pdf() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("libreoffice"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(4)), &Arc::default());

    let result = converter
        .convert(request("memo.docx", b"PK", Format::Png, ConversionOptions::default()))
        .await
        .unwrap();

    assert_eq!(result.strategy, "pdfium-raster");
    let names: Vec<_> = result.attempts.iter().map(|a| a.strategy.as_str()).collect();
    assert!(names.contains(&"pdf-bridge/libreoffice"), "got: {names:?}");
    let bridge = result
        .attempts
        .iter()
        .find(|a| a.strategy == "pdf-bridge")
        .unwrap();
    assert_eq!(bridge.outcome, AttemptOutcome::Bridged);
    assert!(result.file_name.ends_with(".png"));
    assert_eq!(h.leftover_workspaces(), 0);
}

fn pages(start: usize, end: Option<usize>) -> Option<PageRange> {
    Some(PageRange { start, end })
}

#[cfg(unix)]
#[tokio::test]
async fn pdftoppm_renders_first_page_of_range_at_300_dpi() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("pdftoppm"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(8)), &Arc::default());

    let options = ConversionOptions {
        quality: 75,
        page_range: pages(3, Some(5)),
        ..Default::default()
    };
    let result = converter
        .convert(request("deck.pdf", b"%PDF", Format::Jpg, options))
        .await
        .unwrap();

    assert_eq!(result.strategy, "pdftoppm");
    assert!(result.file_name.ends_with(".jpg"));
    let args = runner.calls_to("pdftoppm")[0].args_lossy();
    assert_eq!(
        args[..10],
        ["-jpeg", "-r", "300", "-jpegopt", "quality=75", "-f", "3", "-l", "3", "-singlefile"]
    );
    assert!(args[10].ends_with("deck.pdf"));
    assert!(args[11].ends_with("deck-page3"), "got: {}", args[11]);
}

#[cfg(unix)]
#[tokio::test]
async fn pdftoppm_png_has_no_jpeg_options_and_defaults_to_page_one() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("pdftoppm"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(2)), &Arc::default());

    converter
        .convert(request("deck.pdf", b"%PDF", Format::Png, ConversionOptions::default()))
        .await
        .unwrap();

    let args = runner.calls_to("pdftoppm")[0].args_lossy();
    assert_eq!(args[..8], ["-png", "-r", "300", "-f", "1", "-l", "1", "-singlefile"]);
}

#[cfg(unix)]
#[tokio::test]
async fn ghostscript_takes_over_when_pdftoppm_missing() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("gs"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(8)), &Arc::default());

    let options = ConversionOptions {
        quality: 60,
        page_range: pages(2, Some(7)),
        ..Default::default()
    };
    let result = converter
        .convert(request("deck.pdf", b"%PDF", Format::Jpeg, options))
        .await
        .unwrap();

    assert_eq!(result.strategy, "ghostscript");
    let names: Vec<_> = result.attempts.iter().map(|a| a.strategy.as_str()).collect();
    assert_eq!(names, ["pdftoppm", "ghostscript"]);

    let args = runner.calls_to("gs")[0].args_lossy();
    assert_eq!(
        args[..8],
        [
            "-sDEVICE=jpeg",
            "-dNOPAUSE",
            "-dBATCH",
            "-dSAFER",
            "-r300",
            "-dJPEGQ=60",
            "-dFirstPage=2",
            "-dLastPage=2",
        ]
    );
    assert!(args[8].starts_with("-sOutputFile=") && args[8].ends_with("deck-page2.jpeg"));
}

#[tokio::test]
async fn page_range_reaches_pdftotext() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("pdftotext").pdftotext_text("Chapter"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(9)), &Arc::default());

    for (range, flags) in [
        (pages(2, Some(4)), vec!["-f", "2", "-l", "4"]),
        (pages(3, None), vec!["-f", "3"]),
        (None, vec![]),
    ] {
        let options = ConversionOptions {
            page_range: range,
            ..Default::default()
        };
        converter
            .convert(request("book.pdf", b"%PDF", Format::Txt, options))
            .await
            .unwrap();
        let calls = runner.calls_to("pdftotext");
        let args = calls.last().unwrap().args_lossy();
        assert_eq!(args.len(), flags.len() + 2, "{range:?}: {args:?}");
        assert_eq!(args[..flags.len()], flags[..], "{range:?}");
    }
}

#[tokio::test]
async fn ocr_recognises_only_the_requested_pages() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("pdftoppm"));
    let ocr = Arc::new(FakeOcr::default());
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(6)), &ocr);

    let options = ConversionOptions {
        ocr: true,
        page_range: pages(2, Some(4)),
        ..Default::default()
    };
    let result = converter
        .convert(request("scan.pdf", b"%PDF", Format::Txt, options))
        .await
        .unwrap();

    assert_eq!(result.strategy, "ocr");
    let args = runner.calls_to("pdftoppm")[0].args_lossy();
    assert_eq!(args[..7], ["-png", "-r", "300", "-f", "2", "-l", "4"]);

    let text = std::fs::read_to_string(&result.output_path).unwrap();
    let pages: Vec<_> = text.split('\x0c').collect();
    assert_eq!(pages.len(), 3, "got: {text:?}");
    assert!(pages[0].ends_with("page-2.png"));
    assert!(pages[2].ends_with("page-4.png"));
    assert!(!text.contains("page-1.png") && !text.contains("page-5.png"));
    assert_eq!(ocr.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pdfium_raster_renders_first_page_of_range() {
    let h = Harness::new();
    let converter = h.converter(
        &Arc::new(ScriptedRunner::new()),
        &Arc::new(FakeLibrary::new(5)),
        &Arc::default(),
    );

    let options = ConversionOptions {
        page_range: pages(4, None),
        ..Default::default()
    };
    let result = converter
        .convert(request("deck.pdf", b"%PDF", Format::Png, options))
        .await
        .unwrap();

    assert_eq!(result.strategy, "pdfium-raster");
    assert_eq!(std::fs::read(&result.output_path).unwrap(), b"page 4");
}

// ── Round trip and concurrency ───────────────────────────────────────────────

#[tokio::test]
async fn txt_to_html_and_back() {
    let h = Harness::new();
    let converter = h.converter(
        &Arc::new(ScriptedRunner::new()),
        &Arc::new(FakeLibrary::new(1)),
        &Arc::default(),
    );

    let html = converter
        .convert(normalize(UploadedFile::new("notes.txt", b"Tea & biscuits\nat four".to_vec()), &form("html")).unwrap())
        .await
        .unwrap();
    assert_eq!(html.strategy, "in-process");
    let markup = std::fs::read(&html.output_path).unwrap();
    assert!(String::from_utf8_lossy(&markup).contains("Tea &amp; biscuits"));

    let text = converter
        .convert(normalize(UploadedFile::new("notes.html", markup), &form("txt")).unwrap())
        .await
        .unwrap();
    let body = std::fs::read_to_string(&text.output_path).unwrap();
    assert!(body.contains("Tea & biscuits\nat four"), "got: {body}");
}

#[tokio::test]
async fn concurrent_conversions_get_distinct_outputs() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("libreoffice"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(1)), &Arc::default());

    let jobs = (0..6).map(|_| {
        let converter = converter.clone();
        async move {
            converter
                .convert(request("same.docx", b"PK", Format::Pdf, ConversionOptions::default()))
                .await
        }
    });
    let results = futures::future::join_all(jobs).await;

    let mut paths: Vec<_> = results
        .into_iter()
        .map(|r| r.unwrap().output_path)
        .collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 6);
    assert!(paths.iter().all(|p| p.exists()));
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn cancelled_request_leaves_nothing_behind() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("libreoffice"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(1)), &Arc::default());

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = converter
        .convert_with_cancel(
            request("sample.docx", b"PK", Format::Pdf, ConversionOptions::default()),
            &cancel,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(runner.programs().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn engine_report_marks_missing_office_as_degraded() {
    let h = Harness::new();
    let runner = Arc::new(ScriptedRunner::new().install("pdftotext"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(1)), &Arc::default());
    let report = converter.engine_report().await;
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "degraded");
    let pdftotext = report.engines.iter().find(|e| e.role == "pdftotext").unwrap();
    assert!(pdftotext.available);
    assert_eq!(pdftotext.version.as_deref(), Some("pdftotext 7.6.4"));

    let runner = Arc::new(ScriptedRunner::new().install("soffice"));
    let converter = h.converter(&runner, &Arc::new(FakeLibrary::new(1)), &Arc::default());
    let json = serde_json::to_value(converter.engine_report().await).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[test]
fn convert_sync_runs_without_an_ambient_runtime() {
    let h = Harness::new();
    let converter = h.converter(
        &Arc::new(ScriptedRunner::new()),
        &Arc::new(FakeLibrary::new(1)),
        &Arc::default(),
    );

    let req = normalize(UploadedFile::new("todo.txt", b"milk".to_vec()), &form("html")).unwrap();
    let result = converter.convert_sync(req).unwrap();

    assert_eq!(result.strategy, "in-process");
    assert!(std::fs::read_to_string(&result.output_path).unwrap().contains("milk"));
    assert_eq!(h.leftover_workspaces(), 0);
}
