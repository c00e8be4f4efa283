//! シェルのグローバル状態を保持するモジュール。
//!
//! ジョブテーブル・端末コントローラ・コマンド履歴など、REPL ループ全体で
//! 共有される可変状態をひとつの所有構造体にまとめる。SIGCHLD ハンドラには
//! ジョブテーブルへの生ポインタだけを一度限り登録する（[`crate::reaper`]）。

use crate::history::History;
use crate::job::JobTable;
use crate::reaper;
use crate::signals;
use crate::terminal::TerminalController;

/// シェルの実行状態。REPL ループ全体で共有される。
pub struct Shell {
    /// `Box` でヒープに固定する — 登録した生ポインタ ([`reaper::register`]) は
    /// `Shell` 自体が後で `main` のスタックへ move されても有効でなければ
    /// ならないため、ムーブされるのは箱（ポインタ）であって中身ではない
    /// ことを保証する必要がある。
    pub jobs: Box<JobTable>,
    pub terminal: TerminalController,
    pub history: History,
    /// 直前のコマンドの終了ステータス。プロンプト表示や `exit` のデフォルト値に使う。
    pub last_status: i32,
    /// `exit` ビルトインで true にセットされ、REPL ループを終了させる。
    pub should_exit: bool,
    /// シェル自身のプロセスグループ。モニタ終了時に端末の所有権を戻す先。
    pub shell_pgid: libc::pid_t,
}

impl Shell {
    /// 標準入力が端末であることを前提に呼ぶこと（呼び出し側で `isatty` 済み）。
    pub fn new() -> Self {
        // セッションリーダーと pgid が食い違っている場合は自分のグループを
        // 作る。`tcsetpgrp` は既存かつ同一セッションの pgid にのみ成功する
        // ため、端末を取得する前に済ませておく必要がある。
        unsafe {
            if libc::getsid(0) != libc::getpgid(0) {
                libc::setpgid(0, 0);
            }
        }
        let shell_pgid = unsafe { libc::getpgrp() };

        signals::install();

        let terminal = TerminalController::new(shell_pgid);
        let mut jobs = Box::new(JobTable::new());
        reaper::register(&mut jobs);

        Self {
            jobs,
            terminal,
            history: History::new(),
            last_status: 0,
            should_exit: false,
            shell_pgid,
        }
    }
}

/// 他モジュールの統合テストが `Shell::new()` を安全に呼べるようにするための
/// テスト専用ヘルパー。
///
/// `Shell::new()` は制御端末 (`tcgetattr`/`tcsetpgrp`) と、プロセス全体で
/// 唯一であるべき SIGCHLD ハンドラ登録 ([`reaper::register`]) に依存する。
/// そのため: 標準入力が端末でない環境（大半の CI）では無条件にスキップし、
/// 同一プロセス内で複数のテストが同時に `Shell::new()` を呼んで登録済み
/// ジョブテーブルを奪い合わないよう、プロセス全体で 1 本の `Mutex` で直列化する。
#[cfg(test)]
pub fn run_with_test_shell<F: FnOnce(&mut Shell)>(f: F) {
    use std::sync::Mutex;
    static LOCK: Mutex<()> = Mutex::new(());

    let _guard = LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
    if unsafe { libc::isatty(libc::STDIN_FILENO) } != 1 {
        // 制御端末がない環境（標準的な CI のジョブランナーなど）では
        // `TerminalController::new` が `tcgetattr` の失敗で assert に落ちる
        // ため、この統合テストは検証できることがなく黙ってスキップする。
        return;
    }
    let mut shell = Shell::new();
    f(&mut shell);
}
