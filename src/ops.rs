//! ジョブ制御操作: `jobs` (list)、`fg`/`bg` (resume)、`kill`、シェル終了時の
//! `shutdownjobs`。§4.7。

use crate::job::{ExitStatus, JobState};
use crate::monitor;
use crate::shell::Shell;
use crate::signals;

const FG: usize = 0;

/// `watchjobs(which)`: `which` に一致する非空きスロットを 1 行ずつ報告する。
/// `which = None` は全状態を対象とする。FINISHED として報告したスロットだけ
/// その場で解放する。
pub fn watchjobs(shell: &mut Shell, which: Option<JobState>) {
    let _region = signals::enter_blocked();
    let indices: Vec<usize> = shell.jobs.occupied_indices().collect();
    for j in indices {
        let state = match shell.jobs.state(j) {
            Some(s) => s,
            None => continue, // 同じ走査中に他のスロットの取り扱いで解放された
        };
        if let Some(w) = which {
            if w != state {
                continue;
            }
        }
        let cmd = shell.jobs.job_cmd(j).to_string();
        match state {
            JobState::Running => println!("[{}] running '{}'", j, cmd),
            JobState::Stopped => println!("[{}] suspended '{}'", j, cmd),
            JobState::Finished => {
                let status = shell.jobs.take_if_finished(j).expect("state just observed as Finished");
                // `ExitStatus` はタグ付きなので、exited/signaled を混同し得る
                // 符号化済み整数（`ExitStatus::code()`）からの逆算はしない —
                // タグをそのまま見て判定する。
                match status {
                    ExitStatus::Signaled(signal) => println!("[{}] killed '{}' by signal {}", j, cmd, signal),
                    ExitStatus::Exited(code) => println!("[{}] exited '{}', status={}", j, cmd, code),
                }
            }
        }
    }
}

/// `resumejob(j, bg)`: `j = None` なら最大インデックスの非 FINISHED スロットを
/// 選ぶ。存在しなければ `None` を返す。
///
/// 成功時は `Some(code)` — フォアグラウンドなら [`monitor::wait_for_fg`] が
/// 実際に観測した終了コード、バックグラウンドなら `bg` ビルトイン自体の
/// 成功を表す `0`。呼び出し側（`fg`/`bg` ビルトイン）はこれを `$?` として
/// そのまま使うこと — 呼び出し前の `shell.last_status` を使い回すと、`fg`
/// で再開したジョブの本当の終了コードではなく古いステータスを報告してしまう。
pub fn resumejob(shell: &mut Shell, j: Option<usize>, bg: bool) -> Option<i32> {
    let region = signals::enter_blocked();

    let j = match j.or_else(|| shell.jobs.highest_unfinished()) {
        Some(j) => j,
        None => return None,
    };
    if shell.jobs.is_free(j) || shell.jobs.state(j) == Some(JobState::Finished) {
        return None;
    }

    let pgid = shell.jobs.pgid(j);
    let cmd = shell.jobs.job_cmd(j).to_string();

    if !bg {
        if j != FG {
            shell.jobs.move_job(j, FG);
        }
        let tmodes = shell.jobs.tmodes(FG);
        shell.terminal.set_fg_pgrp(pgid);
        shell.terminal.restore_attrs(&tmodes);
        unsafe {
            libc::kill(-pgid, libc::SIGCONT);
        }
        while shell.jobs.state(FG) != Some(JobState::Running) {
            region.suspend();
        }
        println!("[{}] continue '{}'", FG, cmd);
        Some(monitor::wait_for_fg(shell, &region))
    } else {
        unsafe {
            libc::kill(-pgid, libc::SIGCONT);
        }
        println!("[{}] continue '{}'", j, cmd);
        Some(0)
    }
}

/// `killjob(j)`: SIGTERM を送り、停止中のプロセスが確実に受け取れるよう
/// 続けて SIGCONT を送る。待機はしない。
pub fn killjob(shell: &mut Shell, j: usize) -> bool {
    let _region = signals::enter_blocked();
    if shell.jobs.is_free(j) || shell.jobs.state(j) == Some(JobState::Finished) {
        return false;
    }
    let pgid = shell.jobs.pgid(j);
    unsafe {
        libc::kill(-pgid, libc::SIGTERM);
        libc::kill(-pgid, libc::SIGCONT);
    }
    true
}

/// `shutdownjobs`: 終了前に全ジョブを終了させ、端末ディスクリプタを閉じる。
///
/// `main` はこの後 `std::process::exit` で終了するため（デストラクタは
/// 一切走らない）、`TerminalController` の `Drop` には頼らず、ここで
/// 明示的に端末ディスクリプタを閉じる（`original_source/jobs.c` の
/// `shutdownjobs` 末尾の `Close(tty_fd)` に倣う）。
pub fn shutdownjobs(shell: &mut Shell) {
    let region = signals::enter_blocked();
    let indices: Vec<usize> = shell.jobs.occupied_indices().collect();
    for j in indices {
        if shell.jobs.is_free(j) {
            continue;
        }
        if shell.jobs.state(j) != Some(JobState::Finished) {
            let pgid = shell.jobs.pgid(j);
            unsafe {
                libc::kill(-pgid, libc::SIGTERM);
                libc::kill(-pgid, libc::SIGCONT);
            }
            while shell.jobs.state(j) != Some(JobState::Finished) {
                region.suspend();
            }
        }
    }
    drop(region);
    watchjobs(shell, Some(JobState::Finished));
    unsafe {
        libc::close(shell.terminal.fd());
    }
}
