use flux_shell::Sandbox;
use flux_shell::shell::ExitCode;

/// A sandbox working in `/work`, which holds a few text files.
fn workspace() -> Sandbox {
    let mut sandbox = Sandbox::new();
    sandbox
        .fs
        .add_folder("/work")
        .add_file("/work/a.txt", "apple\nbanana")
        .add_file("/work/b.txt", "cherry")
        .add_file("/work/nums.txt", "10\n9\n100");
    sandbox.run("cd /work");
    sandbox.clear();
    sandbox
}

fn run(line: &str) -> (ExitCode, String, String) {
    let mut sandbox = workspace();
    let code = sandbox.run(line);
    (code, sandbox.output(), sandbox.errors())
}

macro_rules! output_test {
    ($name:ident, $line:expr, $expected:expr) => {
        #[test]
        fn $name() {
            let (_, output, errors) = run($line);
            assert_eq!(output, $expected, "line: {} (errors: {})", $line, errors);
        }
    };
}

macro_rules! exit_test {
    ($name:ident, $line:expr, $code:expr) => {
        #[test]
        fn $name() {
            let (code, _, errors) = run($line);
            assert_eq!(code, ExitCode($code), "line: {} (errors: {})", $line, errors);
        }
    };
}

macro_rules! error_test {
    ($name:ident, $line:expr, $fragment:expr) => {
        #[test]
        fn $name() {
            let (_, _, errors) = run($line);
            assert!(errors.contains($fragment), "line: {}, errors: {}", $line, errors);
        }
    };
}

// ── Tokenizing and quoting ──

output_test!(plain_words, "echo hello world", "hello world");
output_test!(double_quotes_keep_spacing, "echo \"a   b\"", "a   b");
output_test!(single_quoted_operator, "echo 'a && b'", "a && b");
output_test!(quotes_inside_word, "echo x'y'z", "xyz");
output_test!(variable_expanded, "echo $PATH", "/bin:/usr/bin");
output_test!(single_quotes_suppress_variables, "echo '$PATH'", "$PATH");
output_test!(unknown_variable_kept, "echo $NOPE", "$NOPE");
output_test!(tilde_is_home, "echo ~/x", "/root/x");

// ── Globbing ──

output_test!(glob_matches_sorted, "echo *.txt", "a.txt b.txt nums.txt");
output_test!(glob_question_mark, "echo ?.txt", "a.txt b.txt");
output_test!(glob_without_match_kept, "echo *.rs", "*.rs");
output_test!(quoted_glob_literal, "echo '*.txt'", "*.txt");

// ── Sequencing and conditions ──

output_test!(semicolon_runs_both, "echo a; echo b", "a\nb");
output_test!(and_after_success, "true && echo yes", "yes");
output_test!(and_after_failure, "false && echo no", "");
output_test!(or_after_failure, "false || echo fallback", "fallback");
output_test!(or_after_success, "true || echo no", "");
output_test!(and_or_chain, "false && echo a || echo b", "b");
output_test!(semicolon_ignores_status, "false; echo still", "still");
exit_test!(skipped_pipeline_keeps_code, "false && echo no", 1);
exit_test!(last_stage_decides, "true; false", 1);

// ── Pipes ──

output_test!(echo_into_cat, "echo hi | cat", "hi");
output_test!(seq_sorted_reverse, "seq 3 | sort -r", "3\n2\n1");
output_test!(three_stages, "cat a.txt b.txt | grep an | cat", "banana");
output_test!(pipe_stderr, "cat missing.txt |& grep -o \"No such file\"", "No such file");
output_test!(plain_pipe_leaves_stderr, "cat missing.txt | grep -o \"No such file\"", "");
error_test!(stderr_prefixed, "cat missing.txt", "cat > /work/missing.txt: No such file or directory");

// ── Redirections ──

#[test]
fn truncate_replaces_content() {
    let mut sandbox = workspace();
    sandbox.run("echo one > out.txt");
    sandbox.run("echo two > out.txt");
    assert_eq!(sandbox.fs.read("/work/out.txt").as_deref(), Some("two"));
    assert_eq!(sandbox.output(), "");
}

#[test]
fn append_extends_content() {
    let mut sandbox = workspace();
    sandbox.run("echo one > out.txt; echo two >> out.txt");
    assert_eq!(sandbox.fs.read("/work/out.txt").as_deref(), Some("one\ntwo"));
}

#[test]
fn stderr_into_stdout_file() {
    let mut sandbox = workspace();
    let code = sandbox.run("cat missing.txt > out.txt 2>&1");
    assert_eq!(code, ExitCode::GENERAL_ERROR);
    assert_eq!(
        sandbox.fs.read("/work/out.txt").as_deref(),
        Some("cat > /work/missing.txt: No such file or directory")
    );
    assert_eq!(sandbox.errors(), "");
}

#[test]
fn both_streams_to_file() {
    let mut sandbox = workspace();
    sandbox.run("cat a.txt missing.txt &> all.txt");
    let content = sandbox.fs.read("/work/all.txt").unwrap_or_default();
    assert!(content.contains("apple\nbanana"), "{content}");
    assert!(content.contains("No such file or directory"), "{content}");
}

#[test]
fn input_redirect_feeds_stdin() {
    let mut sandbox = workspace();
    sandbox.run("sort -n < nums.txt");
    assert_eq!(sandbox.output(), "9\n10\n100");
}

#[test]
fn missing_input_file_is_misuse() {
    let mut sandbox = workspace();
    assert_eq!(sandbox.run("cat < nope.txt"), ExitCode::MISUSE);
    assert!(sandbox.errors().contains("/work/nope.txt: No such file or directory"));
}

#[test]
fn tee_writes_and_forwards() {
    let mut sandbox = workspace();
    sandbox.run("echo copy | tee t1.txt t2.txt");
    assert_eq!(sandbox.output(), "copy");
    assert_eq!(sandbox.fs.read("/work/t1.txt").as_deref(), Some("copy"));
    assert_eq!(sandbox.fs.read("/work/t2.txt").as_deref(), Some("copy"));
}

output_test!(dangling_redirect_literal, "echo >", ">");

// ── Heredoc ──

#[test]
fn heredoc_reads_continuation_lines() {
    let mut sandbox = Sandbox::with_input(["first $USER", "second", "EOF"]);
    sandbox.shell.set_var("USER", "ada");
    sandbox.run("cat << EOF");
    assert_eq!(sandbox.output(), "first ada\nsecond");
    assert_eq!(sandbox.console.borrow().prompts(), &["> ", "> ", "> "]);
}

// ── Options ──

output_test!(separator_option, "seq -s , 1 3", "1,2,3");
output_test!(separator_inline, "seq --separator=- 1 3", "1-2-3");
output_test!(fractional_steps, "seq 0 0.5 1.5", "0.0\n0.5\n1.0\n1.5");
output_test!(combined_flags, "sort -ru nums.txt a.txt a.txt", "banana\napple\n9\n100\n10");
output_test!(double_dash_ends_options, "echo -- -n", "-n");
output_test!(case_insensitive_grep, "grep -i APPLE a.txt", "apple");
output_test!(inverted_grep, "grep -v apple a.txt", "banana");
output_test!(grep_names_multiple_sources, "grep an a.txt b.txt", "a.txt > banana");
exit_test!(missing_option_value, "seq 1 3 -s", 2);
exit_test!(non_numeric_number_option, "history show -n many", 2);
exit_test!(grep_without_match, "grep zebra a.txt", 1);
exit_test!(invalid_grep_pattern, "grep ( a.txt", 2);
exit_test!(unreachable_sequence, "seq 5 1", 2);
exit_test!(empty_inline_separator, "seq -s= 1 3", 2);

// ── Text tools ──

output_test!(tail_last_line, "tail -n 1 a.txt", "banana");
output_test!(tail_from_stdin, "seq 12 | tail", "3\n4\n5\n6\n7\n8\n9\n10\n11\n12");
output_test!(
    tail_headers_between_files,
    "tail -n 1 a.txt b.txt",
    "==> a.txt <==\nbanana\n\n==> b.txt <==\ncherry"
);
output_test!(tail_quiet, "tail -q -n 1 a.txt b.txt", "banana\ncherry");
output_test!(tail_zero_lines, "tail -n 0 a.txt", "");
exit_test!(tail_missing_file, "tail missing.txt", 2);
output_test!(cols_whitespace, "echo \"a  b c\" | cols 2 0", "c a");
output_test!(cols_delimiter, "echo x,y,z | cols -d , 1", "y");
output_test!(cols_from_file, "cols -f nums.txt 0", "10\n9\n100");
exit_test!(cols_out_of_range, "echo a b | cols 5", 1);
exit_test!(cols_missing_file, "cols -f missing.txt 0", 1);

#[test]
fn clear_wipes_display() {
    let mut sandbox = workspace();
    sandbox.run("echo before; clear; echo after");
    assert_eq!(sandbox.output(), "after");
    assert_eq!(sandbox.console.borrow().screen_clears(), 1);
}

// ── Argument checks and help ──

exit_test!(required_argument_missing, "tee", 2);
error_test!(
    required_argument_message,
    "tee",
    "tee > Not enough arguments. Requires 1, received 0"
);
exit_test!(subcommand_required, "history", 2);
error_test!(
    dispatch_only_message,
    "history",
    "Command doesn't do anything by itself. Use its subcommands."
);

#[test]
fn usage_printed_on_missing_argument() {
    let (_, output, _) = run("tee");
    assert!(output.starts_with("Usage: tee"), "{output}");
}

#[test]
fn help_flag_prints_description() {
    let (code, output, _) = run("echo --help");
    assert_eq!(code, ExitCode::SUCCESS);
    assert!(output.starts_with("Prints the given text"), "{output}");
    assert!(output.contains("Usage:"), "{output}");
}

#[test]
fn help_lists_commands() {
    let (code, output, _) = run("help");
    assert_eq!(code, ExitCode::SUCCESS);
    assert!(output.contains("Available Commands"), "{output}");
    assert!(output.contains("xargs"), "{output}");
}

// ── Variables and aliases ──

#[test]
fn set_then_expand() {
    let mut sandbox = workspace();
    sandbox.run("set GREETING=hello");
    sandbox.clear();
    sandbox.run("echo $GREETING");
    assert_eq!(sandbox.output(), "hello");
}

#[test]
fn last_exit_code_variable() {
    let mut sandbox = workspace();
    sandbox.run("false");
    sandbox.run("echo $?");
    assert_eq!(sandbox.output(), "1");
}

#[test]
fn unset_removes_variable() {
    let mut sandbox = workspace();
    sandbox.run("set TEMP=1");
    assert_eq!(sandbox.run("unset TEMP"), ExitCode::SUCCESS);
    assert_eq!(sandbox.run("unset TEMP"), ExitCode::GENERAL_ERROR);
    assert_eq!(sandbox.shell.var("TEMP"), None);
}

#[test]
fn alias_runs_its_value() {
    let mut sandbox = workspace();
    sandbox.run("alias greet='echo hi there'");
    sandbox.clear();
    sandbox.run("greet friend");
    assert_eq!(sandbox.output(), "hi there friend");
}

#[test]
fn self_referencing_alias_terminates() {
    let mut sandbox = workspace();
    sandbox.run("alias echo='echo loud'");
    sandbox.clear();
    sandbox.run("echo x");
    assert_eq!(sandbox.output(), "loud x");
}

#[test]
fn alias_lookup_quotes_value() {
    let mut sandbox = workspace();
    sandbox.run("alias ll");
    assert_eq!(sandbox.output(), "alias ll='ls -la'");
}

#[test]
fn unalias_all() {
    let mut sandbox = workspace();
    sandbox.run("unalias -a");
    assert!(sandbox.shell.aliases().is_empty());
}

// ── xargs ──

output_test!(xargs_appends_lines, "seq 3 | xargs echo n", "n 1\nn 2\nn 3");
output_test!(xargs_replace, "seq 2 | xargs -I {} -- echo item-{}", "item-1\nitem-2");
output_test!(xargs_delimiter, "echo a,b | xargs -d , echo", "a b");
output_test!(xargs_max_args, "echo a b c | xargs -n 2 -- echo", "a b");
output_test!(xargs_subcommand, "echo x | xargs \"history clear\"", "Cleared 2 entries");
exit_test!(xargs_unknown_command, "echo a | xargs frobnicate", 126);
exit_test!(xargs_failing_command, "echo a.txt | xargs grep zebra", 123);

// ── Programs and resolution ──

#[test]
fn external_program_launched() {
    let mut sandbox = workspace();
    sandbox.fs.add_binary("/bin/nmap", true);
    assert_eq!(sandbox.run("nmap -sV scanme"), ExitCode::SUCCESS);
    assert_eq!(
        sandbox.launcher.calls(),
        vec![("/bin/nmap".to_string(), "-sV scanme".to_string())]
    );
    assert!(sandbox.errors().starts_with("nmap > Note: external programs"));
}

#[test]
fn program_in_working_dir() {
    let mut sandbox = workspace();
    sandbox.fs.add_binary("/work/tool", true);
    assert_eq!(sandbox.run("tool"), ExitCode::SUCCESS);
    assert_eq!(sandbox.launcher.calls()[0].0, "/work/tool");
}

#[test]
fn program_without_execute_permission() {
    let mut sandbox = workspace();
    sandbox.fs.add_binary("/bin/locked", false);
    assert_eq!(sandbox.run("locked"), ExitCode::CMD_NOT_EXECUTABLE);
    assert_eq!(sandbox.errors(), "locked > /bin/locked: Permission denied (x)");
    assert!(sandbox.launcher.calls().is_empty());
}

#[test]
fn text_file_is_not_a_program() {
    let mut sandbox = workspace();
    assert_eq!(sandbox.run("/work/a.txt"), ExitCode::CMD_NOT_EXECUTABLE);
    assert_eq!(sandbox.errors(), "/work/a.txt > /work/a.txt is not an executable file.");
}

exit_test!(unknown_command, "frobnicate --now", 126);
error_test!(unknown_command_message, "frobnicate", "frobnicate > Unknown command: frobnicate");

// ── Session ──

#[test]
fn cd_and_pwd() {
    let mut sandbox = workspace();
    sandbox.fs.add_folder("/work/sub");
    sandbox.run("cd sub");
    sandbox.run("pwd");
    assert_eq!(sandbox.output(), "/work/sub");
    assert_eq!(sandbox.shell.var("PWD"), Some("/work/sub"));
}

#[test]
fn cd_into_file_fails() {
    let mut sandbox = workspace();
    assert_eq!(sandbox.run("cd a.txt"), ExitCode::GENERAL_ERROR);
    assert_eq!(sandbox.errors(), "cd > /work/a.txt is not a folder.");
}

#[test]
fn quit_abandons_rest_of_line() {
    let mut sandbox = workspace();
    assert_eq!(sandbox.run("quit 4; echo unreachable"), ExitCode(4));
    assert_eq!(sandbox.output(), "");
    assert_eq!(sandbox.shell.exit_requested(), Some(ExitCode(4)));
}

#[test]
fn history_show_numbers_entries() {
    let mut sandbox = workspace();
    sandbox.run("echo a");
    sandbox.clear();
    sandbox.run("history show -n 2");
    assert_eq!(sandbox.output(), "   2  echo a\n   3  history show -n 2");
}

#[test]
fn bang_bang_reruns_previous_line() {
    let mut sandbox = workspace();
    sandbox.run("echo again");
    sandbox.clear();
    sandbox.run("!!");
    assert_eq!(sandbox.output(), "echo again\nagain");
}

#[test]
fn input_loop_reads_until_quit() {
    let mut sandbox = Sandbox::with_input(["echo one", "quit 5", "echo never"]);
    assert_eq!(sandbox.shell.start_input_loop(None), ExitCode(5));
    assert_eq!(sandbox.output(), "one");
}
