// End-to-end expansion behavior through the public preprocess API.

mod common;

use common::{code_lines, messages, run, run_with, self_hosted, try_run_with};
use rexpp::diagnostics::Severity;
use rexpp::directives::include::MemoryFileSystem;
use rexpp::{ErrorKind, Options};

#[test]
fn argument_macro_expands_once_and_reaches_a_fixed_point() {
    let out = run("#define FOO(x) x+1\nFOO(5)\n5+1\n").output;
    assert_eq!(code_lines(&out), vec!["5+1", "5+1"]);
}

#[test]
fn nested_arguments_are_bound_whole() {
    let out = run("#define SQUARE(x) ((x)*(x))\nSQUARE(3+4)\n").output;
    assert_eq!(code_lines(&out), vec!["((3+4)*(3+4))"]);
}

#[test]
fn function_macros_see_later_definitions_and_recompile() {
    let input = "\
#define F() { return \"v\" + LATER; }
#define LATER 1
F()
#undef LATER
#define LATER 2
F()
";
    let processed = run(input);
    assert_eq!(code_lines(&processed.output), vec!["v1", "v2"]);
    assert_eq!(processed.stats.compiles_ok, 1);
    assert_eq!(processed.stats.recompiles_ok, 1);
}

#[test]
fn conditional_regions_keep_only_the_active_branch() {
    let processed = run("#if 0\nX\n#else\nY\n#endif\n");
    assert_eq!(code_lines(&processed.output), vec!["Y"]);
    assert!(processed.output.contains("//X\n"));
    assert_eq!(processed.counts.errors, 0);
    assert_eq!(processed.counts.warnings, 0);
}

#[test]
fn extra_endif_is_reported_and_processing_continues() {
    let processed = run("#endif\nafter\n");
    assert_eq!(messages(&processed, Severity::Error), vec!["#endif without matching #if"]);
    assert_eq!(code_lines(&processed.output), vec!["after"]);
}

#[test]
fn self_reintroducing_macro_is_fatal() {
    let err = try_run_with(
        "#define X (X)\nX\n",
        Options::default(),
        MemoryFileSystem::new(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IterationLimit { limit: 20 });
    assert_eq!(err.diagnostic_info.error_code, "rexpp::expand::iteration_limit");
}

#[test]
fn iteration_cap_is_configurable() {
    let options = Options {
        max_iterations: 3,
        ..Options::default()
    };
    // Each pass resolves one step of a backwards chain.
    let input = "#define D E\n#define C D\n#define B C\n#define A B\nA\n";
    let err = try_run_with(input, options, MemoryFileSystem::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::IterationLimit { limit: 3 });
}

#[test]
fn redefinition_warns_or_errors_and_the_latest_wins() {
    let processed = run("#define A 1\n#define A 1\n#define A 2\nA\n");
    assert_eq!(messages(&processed, Severity::Warning).len(), 1);
    let errors = messages(&processed, Severity::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("named macro 'A' redefined @stdin:3"));
    assert_eq!(code_lines(&processed.output), vec!["2"]);
}

#[test]
fn leftmost_match_wins_and_table_order_decides() {
    let out = run("#definex /ab/g() X\n#definex /bc/g() Y\nabc\nbcab\n").output;
    assert_eq!(code_lines(&out), vec!["Xc", "YX"]);
}

#[test]
fn function_results_end_expansion_unless_rescanned() {
    let input = "\
#define A 1
#define PLAIN() { return 'A'; }
#define AGAIN() { return rescan('A'); }
PLAIN()
AGAIN()
";
    assert_eq!(code_lines(&run(input).output), vec!["A", "1"]);
}

#[test]
fn suppress_drops_the_line() {
    let input = "#define DROP() { suppress(); }\nkeep\nDROP() here\n";
    let out = run(input).output;
    assert_eq!(code_lines(&out), vec!["keep"]);
    assert!(out.ends_with("//DROP() here\n"));
}

#[test]
fn variadic_arguments_collect_the_rest() {
    let out = run("#define CALL(f, ...) f(__VA_ARGS__)\nCALL(g, 1, (2, 3))\n").output;
    assert_eq!(code_lines(&out), vec!["g(1, (2, 3))"]);
}

#[test]
fn quoted_text_is_not_expanded() {
    let out = run("#define NAME value\nNAME \"NAME\" 'NAME'\n").output;
    assert_eq!(code_lines(&out), vec!["value \"NAME\" 'NAME'"]);
}

#[test]
fn elif_chains_and_nested_conditionals() {
    let input = "\
#define LEVEL 2
#if LEVEL == 1
one
#elif LEVEL == 2
two
#ifdef MISSING
hidden
#else
shown
#endif
#elif LEVEL == 3
three
#else
other
#endif
";
    let processed = run(input);
    assert_eq!(code_lines(&processed.output), vec!["two", "shown"]);
    assert_eq!(processed.counts.errors, 0);
}

#[test]
fn defines_in_inactive_regions_are_ignored() {
    let out = run("#if 0\n#define GONE 1\n#endif\nGONE\n").output;
    assert_eq!(code_lines(&out), vec!["GONE"]);
}

#[test]
fn undef_removes_and_reports_unknown_names() {
    let processed = run("#define A 1\n#undef A\nA\n#undef A\n");
    assert_eq!(code_lines(&processed.output), vec!["A"]);
    assert_eq!(messages(&processed, Severity::Error), vec!["undefined macro 'A'"]);
}

#[test]
fn unbalanced_brackets_warn_but_pass_through() {
    let processed = run("(a(b\n");
    assert_eq!(code_lines(&processed.output), vec!["(a(b"]);
    assert_eq!(processed.counts.warnings, 1);
}

#[test]
fn pragma_messages_use_their_severity() {
    let processed = run("#pragma message \"a\" + 1\n#warning careful\n#error stop\n");
    assert_eq!(messages(&processed, Severity::Note), vec!["\"a\" + 1 (\"a1\")"]);
    assert_eq!(messages(&processed, Severity::Warning), vec!["careful"]);
    assert_eq!(messages(&processed, Severity::Error), vec!["stop"]);
}

#[test]
fn includes_resolve_from_memory_and_restore_the_location() {
    let fs = MemoryFileSystem::new().with_file("inc/defs.h", "#define GREETING hello\n");
    let options = Options {
        linenums: true,
        ..Options::default()
    };
    let input = "#incl_folder \"inc\"\n#include <defs.h>\nGREETING world\n";
    let processed = run_with(input, options, fs);
    let last = processed.output.lines().last().unwrap_or_default().to_string();
    assert_eq!(last, "stdin:3: hello world");
    assert_eq!(processed.counts.errors, 0);
}

#[test]
fn missing_include_is_an_error() {
    let processed = run("#include \"nowhere.h\"\nnext\n");
    assert_eq!(processed.counts.errors, 1);
    assert_eq!(code_lines(&processed.output), vec!["next"]);
}

#[test]
fn continuation_at_the_end_of_an_include_does_not_leak() {
    let fs = MemoryFileSystem::new().with_file("a.h", "A1 \\\n");
    let options = Options {
        linenums: true,
        ..Options::default()
    };
    let processed = run_with("#include \"a.h\"\nafter\n", options, fs);
    let last = processed.output.lines().last().unwrap_or_default().to_string();
    assert_eq!(last, "stdin:2: after");
    assert!(processed.output.contains("//#line 2 \"stdin\""));
    assert_eq!(
        messages(&processed, Severity::Warning),
        vec!["'./a.h' ends inside a line continuation; continuation dropped"]
    );
}

#[test]
fn recursive_includes_are_fatal() {
    for options in [Options::default(), self_hosted()] {
        let fs = MemoryFileSystem::new().with_file("a.h", "#include \"a.h\"\n");
        let options = Options {
            max_include_depth: 8,
            ..options
        };
        let err = try_run_with("#include \"a.h\"\n", options, fs).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncludeDepth { limit: 8 });
        assert_eq!(err.diagnostic_info.error_code, "rexpp::include::include_depth");
        let help = err.diagnostic_info.help.unwrap_or_default();
        assert!(help.contains("a.h included @stdin:1"), "{}", help);
    }
}

#[test]
fn finished_includes_do_not_count_toward_the_depth() {
    let fs = MemoryFileSystem::new()
        .with_file("b.h", "b\n")
        .with_file("c.h", "#include \"b.h\"\n");
    let options = Options {
        max_include_depth: 2,
        ..Options::default()
    };
    let input = "#include \"b.h\"\n#include \"b.h\"\n#include \"c.h\"\n#include \"c.h\"\n";
    let processed = run_with(input, options, fs);
    assert_eq!(code_lines(&processed.output), vec!["b", "b", "b", "b"]);
    assert_eq!(processed.counts.errors, 0);
}
