// Language Property Tests
//
// Whole-language guarantees: printing and re-parsing, scanner termination,
// stream branching and the ffmpeg command lines a script renders to.

use std::{fs, path::Path};

use pretty_assertions::assert_eq;
use tempfile::{TempDir, tempdir};
use vidlang::ast::TokenKind;
use vidlang::backend::graph::{DryRunner, FilterGraph};
use vidlang::cli::{CliError, ParseOptions, RunOptions, execute_parse, execute_run};
use vidlang::{Config, Context, Interpreter, parse, scan};

fn media_dir(names: &[&str]) -> TempDir {
    let dir = tempdir().unwrap();
    for name in names {
        fs::write(dir.path().join(name), b"").unwrap();
    }
    dir
}

fn quoted(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

fn dry_run(script: &str) -> Vec<Vec<String>> {
    let report = execute_run(&RunOptions {
        script: script.to_string(),
        config: Config::default(),
        debug: false,
        preview: false,
        dry_run: true,
    })
    .unwrap_or_else(|e| panic!("script failed: {e}\n{script}"));
    report.invocations.into_iter().map(|i| i.args).collect()
}

fn filter_complex(args: &[String]) -> &str {
    let pos = args
        .iter()
        .position(|a| a == "-filter_complex")
        .expect("no -filter_complex");
    &args[pos + 1]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Section: Printing and Re-parsing
// ============================================================================

#[test]
fn test_printed_statements_parse_back_identically() {
    let sources = vec![
        "clip := open \"a.mp4\"",
        "x = * |> contrast 1.1",
        "[stream, *] |> crossfade 0.5",
        "clip |> brightness 0.1 * 3 + 0.2",
        "clip |> brightness (-level)",
        "clip |> cut 1 (-2)",
        "clip\n  |> brightness 1\n  |> export \"o.mp4\"",
        "f := [i, el] (el |> brightness i)",
        "a, b := [1, \"two\", true]",
        "name := \"say \\\"hi\\\" \\\\ bye\"",
        "xs := [[1, 2], [], -1]",
        "x := (level * 2)",
        "x := -2",
        "stack \"h\" a b |> export \"o.mp4\"",
        "export clips \"all.mkv\"",
    ];

    for src in sources {
        let original: Vec<_> = parse(src).collect::<Result<_, _>>().unwrap();
        let printed: Vec<String> = original.iter().map(ToString::to_string).collect();
        let reparsed: Vec<_> = parse(&printed.join("\n"))
            .collect::<Result<_, _>>()
            .unwrap_or_else(|e| panic!("printed form of {src:?} does not parse: {e}"));
        assert_eq!(original, reparsed, "Failed for: {src}");
    }
}

// ============================================================================
// Section: Termination
// ============================================================================

const SAMPLE: &str = "# grade the intro\nclip := open \"raw/intro.mp4\"\nclip |> cut 0 12\n  |> brightness 0.05 * 2\n  |> export \"intro.mp4\"\nxs := [a, b]\n";

#[test]
fn test_every_prefix_scans_to_one_terminal_token() {
    for (end, _) in SAMPLE.char_indices() {
        let prefix = &SAMPLE[..end];
        let tokens: Vec<_> = scan(prefix).collect();
        let terminal = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Eof | TokenKind::Error))
            .count();
        assert_eq!(terminal, 1, "Failed for prefix: {prefix:?}");
        assert!(matches!(
            tokens.last().map(|t| t.kind),
            Some(TokenKind::Eof | TokenKind::Error)
        ));
    }
}

#[test]
fn test_every_prefix_parses_to_completion() {
    for (end, _) in SAMPLE.char_indices() {
        let prefix = &SAMPLE[..end];
        let results: Vec<_> = parse(prefix).collect();
        let lines = prefix.lines().count();
        assert!(results.len() <= lines.max(1), "Failed for prefix: {prefix:?}");
    }
    assert!(parse(SAMPLE).all(|r| r.is_ok()));
}

// ============================================================================
// Section: Arithmetic
// ============================================================================

#[test]
fn test_arithmetic_results() {
    let test_cases = vec![
        ("2 + 3 * 4", 14.0),
        ("(2 + 3) * 4", 20.0),
        ("10 - 4 - 3", 3.0),
        ("8 / 4 / 2", 1.0),
        ("0.1 + 0.2", 0.3),
        ("(-2) * 3", -6.0),
    ];

    for (expr, expected) in test_cases {
        let config = Config::default();
        let ctx = Context::new(config.clone()).unwrap();
        let mut interp = Interpreter::new(ctx, FilterGraph::new(&config, DryRunner::default()));
        interp.run(&format!("x := {expr}")).unwrap();
        assert_eq!(interp.context().number("x").unwrap(), expected, "Failed for: {expr}");
    }
}

// ============================================================================
// Section: Rendered Commands
// ============================================================================

#[test]
fn test_filtered_export_renders_reencode() {
    let dir = media_dir(&["a.mp4"]);
    let input = dir.path().join("a.mp4");
    let output = dir.path().join("out.mp4");
    let script = format!(
        "x := open {}\nx |> brightness 1.2 |> export {}",
        quoted(&input),
        quoted(&output)
    );

    let (input, output) = (input.display().to_string(), output.display().to_string());

    let invocations = dry_run(&script);
    assert_eq!(invocations.len(), 1);
    assert_eq!(
        invocations[0],
        strings(&[
            "-y",
            "-hide_banner",
            "-i",
            input.as_str(),
            "-filter_complex",
            "[0:v]eq=brightness=1.2[n2]",
            "-map",
            "[n2]",
            "-c:v",
            "libx264",
            "-c:a",
            "aac",
            "-r",
            "30",
            "-s",
            "1920x1080",
            "-fflags",
            "+genpts",
            output.as_str(),
        ])
    );
}

#[test]
fn test_untouched_export_renders_stream_copy() {
    let dir = media_dir(&["a.mp4"]);
    let input = dir.path().join("a.mp4");
    let output = dir.path().join("copy.mp4");
    let script = format!("x := open {}\nx |> export {}", quoted(&input), quoted(&output));
    let (input, output) = (input.display().to_string(), output.display().to_string());

    assert_eq!(
        dry_run(&script),
        vec![strings(&[
            "-y",
            "-hide_banner",
            "-i",
            input.as_str(),
            "-map",
            "0",
            "-c",
            "copy",
            "-fflags",
            "+genpts",
            output.as_str(),
        ])]
    );
}

#[test]
fn test_preview_streams_side_output() {
    let dir = media_dir(&["a.mp4"]);
    let script = format!(
        "open {} |> export {}",
        quoted(&dir.path().join("a.mp4")),
        quoted(&dir.path().join("o.mp4"))
    );
    let report = execute_run(&RunOptions {
        script,
        config: Config::default(),
        debug: false,
        preview: true,
        dry_run: true,
    })
    .unwrap();

    let args = &report.invocations[0].args;
    assert_eq!(filter_complex(args), "[0:v]split=2[out][preview]");
    assert!(args.windows(2).any(|w| w == ["-map", "[out]"]));
    assert_eq!(args.last().map(String::as_str), Some("udp://127.0.0.1:1234"));
}

// ============================================================================
// Section: Stream Branching
// ============================================================================

#[test]
fn test_filtered_stream_used_twice_is_split() {
    let dir = media_dir(&["a.mp4"]);
    let script = format!(
        "a := open {} |> brightness 1.0\nstack \"h\" a a |> export {}",
        quoted(&dir.path().join("a.mp4")),
        quoted(&dir.path().join("o.mp4"))
    );

    let invocations = dry_run(&script);
    let graph = filter_complex(&invocations[0]);
    assert!(graph.starts_with("[0:v]eq=brightness=1[n1];[n1]split=2[s2o0][s2o1];"), "{graph}");
    assert!(graph.contains("[s2o0]scale=-2:1080[n3]"), "{graph}");
    assert!(graph.contains("[s2o1]scale=-2:1080[n6]"), "{graph}");
    assert!(graph.ends_with("[n5][n8]hstack=inputs=2[n9]"), "{graph}");
}

#[test]
fn test_opened_stream_used_twice_is_not_split() {
    let dir = media_dir(&["a.mp4"]);
    let script = format!(
        "a := open {}\nstack \"h\" a a |> export {}",
        quoted(&dir.path().join("a.mp4")),
        quoted(&dir.path().join("o.mp4"))
    );

    let invocations = dry_run(&script);
    let graph = filter_complex(&invocations[0]);
    assert!(!graph.contains("split"), "{graph}");
    assert_eq!(invocations[0].iter().filter(|a| *a == "-i").count(), 1);
}

// ============================================================================
// Section: Directory Fan-out
// ============================================================================

#[test]
fn test_directory_pipeline_runs_once_per_file() {
    let dir = media_dir(&["b.mp4", "a.mp4", "c.MKV", "notes.txt"]);
    let script = format!(
        "open {} |> brightness 1.1 |> export {}",
        quoted(dir.path()),
        quoted(&dir.path().join("out.mp4"))
    );

    let invocations = dry_run(&script);
    assert_eq!(invocations.len(), 3);
    for (i, (args, input)) in invocations.iter().zip(["a.mp4", "b.mp4", "c.MKV"]).enumerate() {
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 1);
        assert_eq!(args[3], dir.path().join(input).display().to_string());
        assert_eq!(
            args.last().unwrap(),
            &dir.path().join(format!("out_{i}.mp4")).display().to_string()
        );
    }
}

#[test]
fn test_named_export_of_directory_numbers_outputs() {
    let dir = media_dir(&["a.mp4", "b.mp4"]);
    let script = format!(
        "clips := open {}\nexport clips {}",
        quoted(dir.path()),
        quoted(&dir.path().join("all.mkv"))
    );

    let invocations = dry_run(&script);
    assert_eq!(invocations.len(), 2);
    for (i, args) in invocations.iter().enumerate() {
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert_eq!(
            args.last().unwrap(),
            &dir.path().join(format!("all_{i}.mkv")).display().to_string()
        );
    }
}

#[test]
fn test_directory_without_media() {
    let dir = media_dir(&["notes.txt"]);
    let err = execute_run(&RunOptions {
        script: format!("open {} |> export \"x.mp4\"", quoted(dir.path())),
        dry_run: true,
        ..RunOptions::default()
    })
    .unwrap_err();
    assert!(err.to_string().contains("no media files found"), "{err}");
}

// ============================================================================
// Section: Command Line
// ============================================================================

#[test]
fn test_parse_command_json() {
    let output = execute_parse(&ParseOptions {
        script: "clip := open \"a.mp4\"\nclip |> export \"b.mp4\"".to_string(),
        json: true,
    })
    .unwrap();

    let dump: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(dump[0]["type"], "assignment");
    assert_eq!(dump[0]["value"]["pipeline"][0]["name"], "open");
    assert_eq!(dump[1]["input"][0]["name"], "clip");
}

#[test]
fn test_parse_command_reports_unterminated_list() {
    let err = execute_parse(&ParseOptions {
        script: "x := [a, b".to_string(),
        json: false,
    })
    .unwrap_err();

    assert!(matches!(err, CliError::Parse(_)));
    assert!(err.to_string().contains("unterminated list"), "{err}");
}

#[test]
fn test_run_reports_evaluation_errors() {
    let err = execute_run(&RunOptions {
        script: "ghost |> export \"x.mp4\"".to_string(),
        dry_run: true,
        ..RunOptions::default()
    })
    .unwrap_err();
    assert!(matches!(err, CliError::Eval(_)));
}
