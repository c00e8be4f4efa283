//! 子プロセスリーパー: SIGCHLD ハンドラ本体。
//!
//! シェルは単一スレッドで動作するため、ジョブテーブルへのグローバルな
//! 生ポインタを一度だけ登録し、ハンドラはそれを経由して更新を行う
//! （[`crate::signals`] のブロック済みクリティカルセクションがハンドラと
//! メインパスの同時実行を排他しているので、`unsafe` な共有だが安全）。

use std::sync::atomic::{AtomicPtr, Ordering};

use crate::job::JobTable;

static JOB_TABLE: AtomicPtr<JobTable> = AtomicPtr::new(std::ptr::null_mut());

/// グローバルなジョブテーブルへのポインタを登録する。シェル起動時に一度だけ
/// 呼ぶこと。
///
/// # Safety
/// `table` は登録後シェルの寿命が尽きるまでムーブ・解放してはならない。
pub fn register(table: &mut JobTable) {
    JOB_TABLE.store(table as *mut JobTable, Ordering::SeqCst);
}

#[cfg(target_os = "linux")]
unsafe fn get_errno() -> libc::c_int {
    *libc::__errno_location()
}

#[cfg(target_os = "linux")]
unsafe fn set_errno(e: libc::c_int) {
    *libc::__errno_location() = e;
}

#[cfg(target_os = "macos")]
unsafe fn get_errno() -> libc::c_int {
    *libc::__error()
}

#[cfg(target_os = "macos")]
unsafe fn set_errno(e: libc::c_int) {
    *libc::__error() = e;
}

/// SIGCHLD ハンドラ。errno を保存・復元し、利用可能な子プロセスの状態変化を
/// すべて非ブロッキングに drain してジョブテーブルへ反映する。
/// allocation も I/O も行わない。
pub extern "C" fn sigchld_handler(_sig: libc::c_int) {
    let saved = unsafe { get_errno() };
    let ptr = JOB_TABLE.load(Ordering::SeqCst);
    if !ptr.is_null() {
        let table = unsafe { &mut *ptr };
        drain(table);
    }
    unsafe { set_errno(saved) };
}

/// ハンドラ本体と、明示的な drain 呼び出し（フォーク直後の早期 reap など）の
/// 両方から使われる非ブロッキング drain ループ。
fn drain(table: &mut JobTable) {
    loop {
        let mut status: libc::c_int = 0;
        let pid = unsafe {
            libc::waitpid(-1, &mut status, libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED)
        };
        if pid <= 0 {
            break;
        }
        table.mark_pid(pid, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobTable;

    #[test]
    fn register_then_handler_drains_without_crashing() {
        let mut table = JobTable::new();
        register(&mut table);
        // 子プロセスが存在しない状態で呼んでも waitpid(-1,...) が即座に
        // -1/ECHILD を返して抜けるだけで panic しないことを確認する。
        sigchld_handler(libc::SIGCHLD);
    }
}
