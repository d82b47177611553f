use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use vidlang::arith::ArithError;
use vidlang::backend::{
    BackendError, Handle, MediaBackend, OpenError, Param, SplitSource, StackDirection,
};
use vidlang::value::{ValueBox, ValueType};
use vidlang::{Config, Context, EvalError, Interpreter};

/// Backend call as seen by the recorder; parameters are kept rendered.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Open(PathBuf),
    Filter {
        input: Handle,
        filter: String,
        params: Vec<String>,
    },
    Split(Handle),
    Concat(Vec<Handle>),
    Stack(StackDirection, Vec<Handle>),
    Trim {
        input: Handle,
        start: f64,
        end: f64,
    },
    Export {
        input: Handle,
        output: PathBuf,
        copy: bool,
        preview: bool,
    },
}

/// Hands out one node per call and remembers every call. Paths starting
/// with `missing` do not exist.
#[derive(Debug, Default)]
struct Recorder {
    nodes: usize,
    calls: Vec<Call>,
}

impl Recorder {
    fn node(&mut self, call: Call) -> Handle {
        self.calls.push(call);
        self.nodes += 1;
        Handle::new(self.nodes - 1, 0)
    }

    fn exports(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Export { .. }))
            .collect()
    }

    fn filters(&self) -> Vec<(String, Vec<String>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Filter { filter, params, .. } => Some((filter.clone(), params.clone())),
                _ => None,
            })
            .collect()
    }
}

impl MediaBackend for Recorder {
    fn open(&mut self, path: &Path) -> Result<Handle, OpenError> {
        if path.to_string_lossy().starts_with("missing") {
            return Err(OpenError::NotFound(path.to_path_buf()));
        }
        Ok(self.node(Call::Open(path.to_path_buf())))
    }

    fn apply_filter(
        &mut self,
        input: Handle,
        filter: &str,
        params: &[Param],
    ) -> Result<Handle, BackendError> {
        Ok(self.node(Call::Filter {
            input,
            filter: filter.to_string(),
            params: params.iter().map(Param::to_string).collect(),
        }))
    }

    fn split(&mut self, input: Handle) -> Result<SplitSource, BackendError> {
        let handle = self.node(Call::Split(input));
        Ok(SplitSource::new(handle.node))
    }

    fn concat(&mut self, inputs: &[Handle]) -> Result<Handle, BackendError> {
        Ok(self.node(Call::Concat(inputs.to_vec())))
    }

    fn stack(
        &mut self,
        direction: StackDirection,
        inputs: &[Handle],
    ) -> Result<Handle, BackendError> {
        Ok(self.node(Call::Stack(direction, inputs.to_vec())))
    }

    fn trim(&mut self, input: Handle, start: f64, end: f64) -> Result<Handle, BackendError> {
        if end <= start {
            return Err(BackendError::InvalidInput("empty range".to_string()));
        }
        Ok(self.node(Call::Trim { input, start, end }))
    }

    fn export(
        &mut self,
        input: Handle,
        output: &Path,
        copy_eligible: bool,
        preview: bool,
    ) -> Result<(), BackendError> {
        self.calls.push(Call::Export {
            input,
            output: output.to_path_buf(),
            copy: copy_eligible,
            preview,
        });
        Ok(())
    }
}

fn interpreter() -> Interpreter<Recorder> {
    Interpreter::new(Context::new(Config::default()).unwrap(), Recorder::default())
}

fn run_ok(src: &str) -> Interpreter<Recorder> {
    let mut interp = interpreter();
    if let Err(e) = interp.run(src) {
        panic!("script failed: {e}\n{src}");
    }
    interp
}

fn run_err(src: &str) -> EvalError {
    interpreter()
        .run(src)
        .expect_err("script should have failed")
}

fn export(input: Handle, output: &str, copy: bool) -> Call {
    Call::Export {
        input,
        output: PathBuf::from(output),
        copy,
        preview: false,
    }
}

fn h(node: usize, output: usize) -> Handle {
    Handle::new(node, output)
}

// ============================================================================
// Stream Bindings
// ============================================================================

#[test]
fn test_opened_stream_is_read_without_branching() {
    let mut interp = run_ok("clip := open \"a.mp4\"");
    let ctx = interp.context_mut();

    for _ in 0..3 {
        let read = ctx.read_stream("clip").unwrap();
        assert!(read.eligible);
        assert_eq!(read.handles, vec![h(0, 0)]);
    }
    assert_eq!(ctx.streams.branch_count("clip"), Some(0));
}

#[test]
fn test_filtered_stream_reads_draw_new_branches() {
    let mut interp = run_ok("a := open \"x.mp4\" |> brightness 1.0");
    let ctx = interp.context_mut();

    // open, eq, then the splitter made when `a` was bound
    let first = ctx.read_stream("a").unwrap();
    let second = ctx.read_stream("a").unwrap();
    assert!(!first.eligible);
    assert_eq!(first.handles, vec![h(2, 0)]);
    assert_eq!(second.handles, vec![h(2, 1)]);
}

#[test]
fn test_self_reference_reads_the_destination() {
    let mut interp = run_ok("x := open \"a.mp4\"\nx = * |> brightness 1.1");

    assert!(interp.backend().calls.contains(&Call::Filter {
        input: h(0, 0),
        filter: "eq".to_string(),
        params: vec!["brightness=1.1".to_string()],
    }));
    let read = interp.context_mut().read_stream("x").unwrap();
    assert!(!read.eligible);
    assert_eq!(read.handles, vec![h(3, 0)]);
}

#[test]
fn test_bare_pipeline_becomes_global_stream() {
    let interp = run_ok("open \"a.mp4\" |> cut 0 10\nstream |> export \"first.mp4\"");
    let exports = interp.backend().exports();
    assert_eq!(exports.len(), 1);
    assert!(matches!(exports[0], Call::Export { copy: false, .. }));
}

#[test]
fn test_rebinding_switches_between_value_and_stream() {
    let interp = run_ok("x := 1\nx := open \"a.mp4\"");
    let ctx = interp.context();
    assert!(ctx.streams.contains("x"));
    assert!(!ctx.variables.contains_key("x"));

    let interp = run_ok("x := open \"a.mp4\"\nx = 2");
    let ctx = interp.context();
    assert!(!ctx.streams.contains("x"));
    assert_eq!(ctx.number("x").unwrap(), 2.0);
}

#[test]
fn test_stream_alias() {
    let mut interp = run_ok("a := open \"a.mp4\"\nb := a");
    let read = interp.context_mut().read_stream("b").unwrap();
    assert!(read.eligible);
    assert_eq!(read.handles, vec![h(0, 0)]);
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_value_bindings() {
    let interp = run_ok(
        "level := 0.5\nboost := (level * 3)\nname := \"intro\"\nflag := true\nxs := [1, 2]\nf := [i, el] (el |> brightness i)",
    );
    let ctx = interp.context();

    assert_eq!(ctx.number("boost").unwrap(), 1.5);
    assert_eq!(ctx.variable("name").unwrap().as_str(), Some("intro"));
    assert_eq!(ctx.variable("flag").unwrap().as_bool(), Some(true));
    assert_eq!(
        ctx.variable("xs").unwrap(),
        &ValueBox::List(vec![ValueBox::Number(1.0), ValueBox::Number(2.0)])
    );
    assert_eq!(ctx.variable("f").unwrap().value_type(), ValueType::SubExpr);
}

#[test]
fn test_multiple_destinations_share_a_value() {
    let interp = run_ok("a, b := 4");
    assert_eq!(interp.context().number("a").unwrap(), 4.0);
    assert_eq!(interp.context().number("b").unwrap(), 4.0);
}

#[test]
fn test_arithmetic_arguments_use_variables() {
    let interp = run_ok("level := 0.5\nclip := open \"a.mp4\"\nclip |> brightness (level + 0.1)");
    assert_eq!(
        interp.backend().filters(),
        vec![("eq".to_string(), vec!["brightness=0.6".to_string()])]
    );
}

#[test]
fn test_string_variable_as_argument() {
    let interp = run_ok("src := \"a.mp4\"\nout := \"b.mp4\"\nopen src |> flip \"h\" |> export out");
    assert_eq!(interp.backend().calls[0], Call::Open(PathBuf::from("a.mp4")));
    assert_eq!(
        interp.backend().filters(),
        vec![("hflip".to_string(), vec![])]
    );
    assert_eq!(interp.backend().exports(), vec![&export(h(1, 0), "b.mp4", false)]);
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn test_export_of_filtered_stream_reencodes() {
    let interp = run_ok("x := open \"a.mp4\"\nx |> brightness 1.2 |> export \"out.mp4\"");
    assert_eq!(interp.backend().exports(), vec![&export(h(2, 0), "out.mp4", false)]);
}

#[test]
fn test_export_of_untouched_stream_copies() {
    let interp = run_ok("x := open \"a.mp4\"\nx |> export \"copy.mp4\"");
    assert_eq!(interp.backend().exports(), vec![&export(h(0, 0), "copy.mp4", true)]);
}

#[test]
fn test_named_export() {
    let interp = run_ok("a := open \"a.mp4\"\nexport a \"named.mp4\"");
    assert_eq!(interp.backend().exports(), vec![&export(h(0, 0), "named.mp4", true)]);
}

#[test]
fn test_named_export_of_filtered_stream_keeps_stream_untrusted() {
    let mut interp = run_ok(
        "a := open \"x.mp4\" |> brightness 1.2\nexport a \"o.mp4\"\nstream |> export \"p.mp4\"",
    );

    // open, eq, splitter for `a`, splitter for `stream`, splitter for `stream` again
    assert_eq!(
        interp.backend().exports(),
        vec![
            &export(h(2, 0), "o.mp4", false),
            &export(h(3, 0), "p.mp4", false),
        ]
    );
    let read = interp.context_mut().read_stream("stream").unwrap();
    assert!(!read.eligible);
    assert_eq!(read.handles, vec![h(4, 0)]);
    assert_eq!(interp.context().streams.branch_count("stream"), Some(1));
}

#[test]
fn test_export_sends_preview_when_enabled() {
    let ctx = Context::new(Config::default()).unwrap().with_preview(true);
    let mut interp = Interpreter::new(ctx, Recorder::default());
    interp.run("open \"a.mp4\" |> export \"o.mp4\"").unwrap();

    assert!(matches!(
        interp.backend().exports()[0],
        Call::Export { copy: true, preview: true, .. }
    ));
}

#[test]
fn test_color_filters() {
    let interp = run_ok(
        "clip := open \"a.mp4\"\nclip |> contrast 1.1 |> saturation 0.8 |> gamma 1.5 |> hue 90",
    );
    assert_eq!(
        interp.backend().filters(),
        vec![
            ("eq".to_string(), vec!["contrast=1.1".to_string()]),
            ("eq".to_string(), vec!["saturation=0.8".to_string()]),
            ("eq".to_string(), vec!["gamma=1.5".to_string()]),
            ("hue".to_string(), vec!["h=90".to_string()]),
        ]
    );
}

#[test]
fn test_flip_directions() {
    let interp = run_ok("clip := open \"a.mp4\"\nclip |> flip \"h\" |> flip \"v\"");
    assert_eq!(
        interp.backend().filters(),
        vec![("hflip".to_string(), vec![]), ("vflip".to_string(), vec![])]
    );
}

#[test]
fn test_cut_trims_and_resets_timestamps() {
    let interp = run_ok("clip := open \"a.mp4\"\nclip |> cut 2 5 |> export \"c.mp4\"");
    let calls = &interp.backend().calls;

    assert_eq!(
        calls[2],
        Call::Trim {
            input: h(0, 0),
            start: 2.0,
            end: 5.0,
        }
    );
    assert_eq!(
        calls[3],
        Call::Filter {
            input: h(2, 0),
            filter: "setpts".to_string(),
            params: vec!["PTS-STARTPTS".to_string()],
        }
    );
    assert_eq!(calls[4], export(h(3, 0), "c.mp4", false));
}

#[test]
fn test_speed() {
    let interp = run_ok("clip := open \"a.mp4\"\nclip |> speed 2");
    assert_eq!(
        interp.backend().filters(),
        vec![("setpts".to_string(), vec!["PTS/2".to_string()])]
    );
}

#[test]
fn test_concat_prepends_piped_input() {
    let interp = run_ok(
        "a := open \"a.mp4\"\nb := open \"b.mp4\"\na |> concat b |> export \"ab.mp4\"",
    );
    let backend = interp.backend();

    // a: 0 (split 1), b: 2 (split 3), three normalizing filters each
    assert!(backend.calls.contains(&Call::Concat(vec![h(6, 0), h(9, 0)])));
    assert_eq!(
        backend.filters()[..3],
        [
            (
                "scale".to_string(),
                vec!["1920:1080:force_original_aspect_ratio=decrease".to_string()]
            ),
            ("pad".to_string(), vec!["1920:1080:(ow-iw)/2:(oh-ih)/2".to_string()]),
            ("setpts".to_string(), vec!["PTS-STARTPTS".to_string()]),
        ]
    );
    assert_eq!(backend.exports(), vec![&export(h(10, 0), "ab.mp4", false)]);
}

#[test]
fn test_concat_without_piped_input() {
    let interp = run_ok("a := open \"a.mp4\"\nb := open \"b.mp4\"\nconcat a b |> export \"ab.mp4\"");
    assert!(interp.backend().calls.contains(&Call::Concat(vec![h(6, 0), h(9, 0)])));
}

#[test]
fn test_stack_vertical() {
    let interp = run_ok("a := open \"a.mp4\"\nb := open \"b.mp4\"\na |> stack \"v\" b");
    let backend = interp.backend();

    assert!(
        backend
            .calls
            .contains(&Call::Stack(StackDirection::Vertical, vec![h(6, 0), h(9, 0)]))
    );
    assert_eq!(
        backend.filters()[..3],
        [
            ("scale".to_string(), vec!["1920:-2".to_string()]),
            ("pad".to_string(), vec!["1920:ih:(ow-iw)/2:(oh-ih)/2".to_string()]),
            ("setsar".to_string(), vec!["1".to_string()]),
        ]
    );
}

#[test]
fn test_stack_horizontal_scales_to_common_height() {
    let interp = run_ok("a := open \"a.mp4\"\nb := open \"b.mp4\"\nstack \"h\" a b");
    let filters = interp.backend().filters();
    assert_eq!(filters[0], ("scale".to_string(), vec!["-2:1080".to_string()]));
    assert_eq!(
        filters[1],
        ("pad".to_string(), vec!["iw:1080:(ow-iw)/2:(oh-ih)/2".to_string()])
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_variable() {
    let err = run_err("ghost |> export \"x.mp4\"");
    assert!(matches!(err, EvalError::UnknownVariable(ref name) if name == "ghost"));
    assert_eq!(err.to_string(), "variable `ghost` not found");
}

#[test]
fn test_value_used_as_stream() {
    let err = run_err("level := 1\nlevel |> export \"x.mp4\"");
    assert!(matches!(
        err,
        EvalError::TypeMismatch {
            expected: ValueType::Stream,
            found: ValueType::Number,
            ..
        }
    ));
}

#[test]
fn test_assignment_requires_declaration() {
    let err = run_err("x = 1");
    assert!(matches!(err, EvalError::Undeclared(ref name) if name == "x"));
}

#[test]
fn test_stream_cannot_go_to_several_names() {
    let err = run_err("a, b := open \"a.mp4\"");
    assert!(matches!(err, EvalError::MultipleDestinations(ref names) if names.len() == 2));
}

#[test]
fn test_multiple_inputs_rejected() {
    let err = run_err("[a, b] |> export \"x.mp4\"");
    assert!(matches!(err, EvalError::MultipleInputs(2)));
}

#[test]
fn test_self_outside_assignment() {
    let err = run_err("[*] |> export \"x.mp4\"");
    assert!(matches!(err, EvalError::SelfOutsideAssignment));
}

#[test]
fn test_unhandled_keyword_is_unknown_command() {
    let err = run_err("clip := open \"a.mp4\"\nclip |> volume 0.5");
    assert!(matches!(err, EvalError::UnknownCommand(ref name) if name == "volume"));
}

#[test]
fn test_wrong_argument_count() {
    let err = run_err("clip := open \"a.mp4\"\nclip |> brightness");
    assert_eq!(err.to_string(), "brightness takes 1 argument, got 0");

    let err = run_err("clip := open \"a.mp4\"\nclip |> cut 1");
    assert_eq!(err.to_string(), "cut takes 2 arguments, got 1");
}

#[test]
fn test_wrong_argument_kind() {
    let err = run_err("clip := open \"a.mp4\"\nclip |> brightness \"bright\"");
    assert!(matches!(
        err,
        EvalError::WrongKind {
            position: 1,
            expected: ValueType::Number,
            ..
        }
    ));
    assert_eq!(err.to_string(), "brightness: argument 1 must be a number, got string");
}

#[test]
fn test_filter_needs_input() {
    let err = run_err("brightness 1.2");
    assert!(matches!(err, EvalError::MissingInput(ref name) if name == "brightness"));
}

#[test]
fn test_open_must_come_first() {
    assert!(matches!(
        run_err("clip := open \"a.mp4\"\nclip |> open \"b.mp4\""),
        EvalError::MisplacedOpen
    ));
    assert!(matches!(
        run_err("open \"a.mp4\" |> open \"b.mp4\""),
        EvalError::MisplacedOpen
    ));
}

#[test]
fn test_open_missing_file() {
    let err = run_err("open \"missing.mp4\" |> export \"x.mp4\"");
    assert!(matches!(
        err,
        EvalError::Open {
            source: OpenError::NotFound(_),
            ..
        }
    ));
    assert_eq!(err.to_string(), "open: path not found: missing.mp4");
}

#[test]
fn test_invalid_arguments() {
    let test_cases = vec![
        "clip |> flip \"x\"",
        "clip |> speed 0",
        "clip |> stack \"d\" clip",
    ];

    for src in test_cases {
        let err = run_err(&format!("clip := open \"a.mp4\"\n{src}"));
        assert!(
            matches!(err, EvalError::InvalidArgument { .. }),
            "Failed for {src}: {err:?}"
        );
    }
}

#[test]
fn test_backend_error_names_command() {
    let err = run_err("clip := open \"a.mp4\"\nclip |> cut 5 1");
    assert!(matches!(
        err,
        EvalError::Backend {
            ref command,
            source: BackendError::InvalidInput(_),
        } if command == "cut"
    ));
}

#[test]
fn test_division_by_zero() {
    let err = run_err("x := (1 / 0)");
    assert!(matches!(err, EvalError::Arith(ArithError::DivisionByZero(_))));
}

#[test]
fn test_syntax_error_is_reported() {
    let err = run_err("x := [a");
    assert!(matches!(err, EvalError::Syntax(_)));
}

#[test]
fn test_first_error_stops_evaluation() {
    let mut interp = interpreter();
    assert!(interp.run("a := 1\nghost |> export \"x\"\nb := 2").is_err());
    assert!(interp.context().is_bound("a"));
    assert!(!interp.context().is_bound("b"));
}
