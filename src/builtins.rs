//! ビルトインコマンドの実装。
//!
//! ビルトインはfork/execを経由せずプロセス内で直接実行されるため高速。
//! `try_exec()` が `Some(status)` を返せばビルトインとして処理済み、
//! `None` なら外部コマンドとして launcher に委ねる。
//!
//! `fg`/`bg`/`jobs`/`kill` はジョブ制御操作 ([`crate::ops`]) への薄い
//! ラッパーで、シェル本体 (`Shell`) への可変アクセスを必要とするため
//! `stdout` writer ではなく直接 `println!`/`eprintln!` に出力する —
//! パイプラインの一段として実行される場合は、呼び出し元 ([`crate::launcher`])
//! がフォーク済みの子プロセス内でこれを呼ぶため、標準出力は既にリダイレクト
//! 先へ `dup2` 済みになっている。

use std::env;
use std::io::Write;
use std::path::Path;

use crate::ops;
use crate::shell::Shell;

/// コマンド名がビルトインかどうかを判定する。
///
/// executor がビルトイン判定 → リダイレクト準備 → 実行、の順で処理するために使用。
pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "exit" | "quit" | "cd" | "pwd" | "echo" | "export" | "unset" | "fg" | "bg" | "jobs" | "kill"
    )
}

/// ビルトインコマンドの実行を試みる。
///
/// 出力系ビルトイン (pwd, echo, export) はリダイレクト対応のため `stdout` writer に書き込む。
/// `fg`/`bg`/`jobs`/`kill` は `Shell` への可変アクセスが必要なため、出力先は常に
/// プロセスの実際の標準出力/標準エラーになる（呼び出し側が `dup2` 済みであることに依存）。
///
/// 戻り値:
/// - `Some(status)` — ビルトインとして実行済み
/// - `None` — 該当するビルトインなし（外部コマンドとして実行すべき）
pub fn try_exec(shell: &mut Shell, args: &[&str], stdout: &mut dyn Write) -> Option<i32> {
    match args[0] {
        "exit" | "quit" => Some(builtin_exit(shell, args)),
        "cd" => Some(builtin_cd(args)),
        "pwd" => Some(builtin_pwd(stdout)),
        "echo" => Some(builtin_echo(args, stdout)),
        "export" => Some(builtin_export(args, stdout)),
        "unset" => Some(builtin_unset(args)),
        "fg" => Some(builtin_fg(shell, args)),
        "bg" => Some(builtin_bg(shell, args)),
        "jobs" => Some(builtin_jobs(shell, args)),
        "kill" => Some(builtin_kill(shell, args)),
        _ => None,
    }
}

/// `exit [N]` (`quit` も同義) — シェルを終了する。Nが指定されればそのコードで、省略時は直前のステータスで終了。
fn builtin_exit(shell: &mut Shell, args: &[&str]) -> i32 {
    shell.should_exit = true;
    if args.len() > 1 {
        args[1].parse::<i32>().unwrap_or_else(|_| {
            eprintln!("jsh: exit: {}: numeric argument required", args[1]);
            2
        })
    } else {
        shell.last_status
    }
}

/// `cd [dir]` — カレントディレクトリを変更する。引数省略時は `$HOME` に移動。
fn builtin_cd(args: &[&str]) -> i32 {
    let target = if args.len() > 1 {
        args[1].to_string()
    } else {
        match env::var("HOME") {
            Ok(home) => home,
            Err(_) => {
                eprintln!("jsh: cd: HOME not set");
                return 1;
            }
        }
    };

    if let Err(e) = env::set_current_dir(Path::new(&target)) {
        eprintln!("jsh: cd: {}: {}", target, e);
        1
    } else {
        0
    }
}

/// `pwd` — カレントディレクトリを出力する。
fn builtin_pwd(stdout: &mut dyn Write) -> i32 {
    match env::current_dir() {
        Ok(path) => {
            let _ = writeln!(stdout, "{}", path.display());
            0
        }
        Err(e) => {
            eprintln!("jsh: pwd: {}", e);
            1
        }
    }
}

/// `echo [-n] args...` — 引数をスペース区切りで出力する。`-n` で改行抑制。
fn builtin_echo(args: &[&str], stdout: &mut dyn Write) -> i32 {
    let (no_newline, words) = if args.len() > 1 && args[1] == "-n" {
        (true, &args[2..])
    } else {
        (false, &args[1..])
    };

    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            let _ = write!(stdout, " ");
        }
        let _ = write!(stdout, "{}", word);
    }

    if !no_newline {
        let _ = writeln!(stdout);
    }

    0
}

/// `export [VAR=val...]` — 環境変数を設定する。引数なしなら全変数をソート済みで一覧表示。
fn builtin_export(args: &[&str], stdout: &mut dyn Write) -> i32 {
    if args.len() <= 1 {
        // 全変数を一覧表示（ソート済み）
        let mut vars: Vec<(String, String)> = env::vars().collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in &vars {
            let _ = writeln!(stdout, "declare -x {}=\"{}\"", key, value);
        }
        return 0;
    }

    for arg in &args[1..] {
        if let Some(eq_pos) = arg.find('=') {
            let key = &arg[..eq_pos];
            let value = &arg[eq_pos + 1..];
            env::set_var(key, value);
        } else {
            // 引数に `=` がない場合は無視（bash互換: export VAR は既存変数をexportする）
        }
    }

    0
}

/// `unset VAR...` — 環境変数を削除する。
fn builtin_unset(args: &[&str]) -> i32 {
    for arg in &args[1..] {
        env::remove_var(arg);
    }
    0
}

/// `%3`・`3`・`%` いずれの形式も受け付けてジョブ番号へ変換する。
/// `%` のみ、または引数なしは「最大の未終了ジョブ」を意味する `None` を返す。
fn parse_job_spec(arg: Option<&&str>) -> Result<Option<usize>, String> {
    let arg = match arg {
        Some(a) => *a,
        None => return Ok(None),
    };
    let digits = arg.strip_prefix('%').unwrap_or(arg);
    if digits.is_empty() {
        return Ok(None);
    }
    digits
        .parse::<usize>()
        .map(Some)
        .map_err(|_| format!("{}: no such job", arg))
}

/// `fg [%job]` — 指定ジョブ（省略時は最新の未終了ジョブ）をフォアグラウンドへ復帰させる。
fn builtin_fg(shell: &mut Shell, args: &[&str]) -> i32 {
    let job = match parse_job_spec(args.get(1)) {
        Ok(j) => j,
        Err(msg) => {
            eprintln!("jsh: fg: {}", msg);
            return 1;
        }
    };
    match ops::resumejob(shell, job, false) {
        Some(code) => code,
        None => {
            eprintln!("jsh: fg: no such job");
            1
        }
    }
}

/// `bg [%job]` — 指定ジョブ（省略時は最新の未終了ジョブ）をバックグラウンドで再開させる。
fn builtin_bg(shell: &mut Shell, args: &[&str]) -> i32 {
    let job = match parse_job_spec(args.get(1)) {
        Ok(j) => j,
        Err(msg) => {
            eprintln!("jsh: bg: {}", msg);
            return 1;
        }
    };
    match ops::resumejob(shell, job, true) {
        Some(code) => code,
        None => {
            eprintln!("jsh: bg: no such job");
            1
        }
    }
}

/// `jobs` — 現在のジョブを一覧表示する。
fn builtin_jobs(shell: &mut Shell, _args: &[&str]) -> i32 {
    ops::watchjobs(shell, None);
    0
}

/// `kill %job` — 指定ジョブへ SIGTERM を送る。`kill -SIGNAL %job` は未対応。
fn builtin_kill(shell: &mut Shell, args: &[&str]) -> i32 {
    if args.len() < 2 {
        eprintln!("jsh: kill: usage: kill %job");
        return 1;
    }
    let job = match parse_job_spec(args.get(1)) {
        Ok(Some(j)) => j,
        Ok(None) => {
            eprintln!("jsh: kill: usage: kill %job");
            return 1;
        }
        Err(msg) => {
            eprintln!("jsh: kill: {}", msg);
            return 1;
        }
    };
    if ops::killjob(shell, job) {
        0
    } else {
        eprintln!("jsh: kill: {}: no such job", job);
        1
    }
}

// ── Tests ───────────────────────────────────────────────────────────
