//! jsh — ジョブ制御を備えた対話型 POSIX シェルのコア。
//!
//! REPL ループ: プロンプト表示 → 1 行読み取り → パース → 評価 → 完了ジョブの
//! 自動通知、を繰り返す。標準入力が端末でなければ起動しない（§6）。

use jsh::job::JobState;
use jsh::shell::Shell;
use jsh::{executor, line_reader, ops, parser};

fn prompt(shell: &Shell) -> String {
    if shell.last_status == 0 {
        "# ".to_string()
    } else {
        format!("[{}] # ", shell.last_status)
    }
}

fn main() {
    if unsafe { libc::isatty(libc::STDIN_FILENO) } == 0 {
        eprintln!("jsh: standard input is not a terminal");
        std::process::exit(1);
    }

    let mut shell = Shell::new();
    let mut eof = false;

    loop {
        let line = match line_reader::read_line(&prompt(&shell)) {
            line_reader::Line::Text(line) => line,
            line_reader::Line::Interrupted => {
                println!();
                continue;
            }
            line_reader::Line::Eof => {
                eof = true;
                break;
            }
        };

        if !line.trim().is_empty() {
            shell.history.add(&line);

            match parser::parse(&line, shell.last_status) {
                Ok(Some(list)) => {
                    shell.last_status = executor::execute(&mut shell, &list);
                }
                Ok(None) => {}
                Err(e) => {
                    eprintln!("jsh: parse error: {:?}", e);
                    shell.last_status = 2;
                }
            }
        }

        // 行ごとに完了済みジョブを通知する（`original_source` の shell.c が
        // 毎プロンプトで行う `watchjobs(FINISHED)` に倣う）。
        ops::watchjobs(&mut shell, Some(JobState::Finished));

        if shell.should_exit {
            break;
        }
    }

    println!();
    ops::shutdownjobs(&mut shell);
    // 入力終端 (Ctrl-D) は常にステータス 0 で終了する。`exit`/`quit` ビルトイン
    // によるループ離脱はそのビルトインが計算したコードを使う。
    std::process::exit(if eof { 0 } else { shell.last_status });
}
