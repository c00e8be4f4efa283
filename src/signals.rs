//! シグナル調停者 (Signal Arbiter)。
//!
//! SIGCHLD/SIGINT のディスポジションをインストールし、ジョブテーブルへの
//! 同時アクセスを防ぐ「ブロック済みクリティカルセクション」の基盤を提供する。
//! ジョブテーブルを読み書きする全コードはこのモジュールが公開する
//! [`enter_blocked`] のスコープ内で実行されなければならない。

use std::mem::MaybeUninit;

/// ジョブテーブルを保護する正規マスク。SIGCHLD のみを含む。
fn chld_set() -> libc::sigset_t {
    unsafe {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), libc::SIGCHLD);
        set.assume_init()
    }
}

/// SIGCHLD ハンドラ、SIGINT の no-op ハンドラ、および SIGTSTP/SIGTTIN/SIGTTOU
/// の無視ディスポジションをインストールする。シェル起動時に一度だけ呼ぶ。
///
/// - SIGCHLD: [`crate::reaper::sigchld_handler`] を `SA_RESTART` 付きで登録する。
///   スローな I/O (端末の `read(2)` 等) を spuriously に中断しないためだが、
///   ハンドラ自身は SIGINT をマスクした状態で走る — SIGINT ハンドラが reap の
///   途中に割り込むのを防ぐため。
/// - SIGINT: ハンドラは何もしない。プロンプトでのブロッキング `read(2)` を
///   EINTR で中断させ、再描画のきっかけを作るためだけに存在する。
///   `SA_RESTART` は立てない — 中断こそが目的。
/// - SIGTSTP/SIGTTIN/SIGTTOU: シェル自身が端末アクセスで停止・ブロックされて
///   はならないため無視する。
pub fn install() {
    unsafe {
        let mut chld_act: libc::sigaction = std::mem::zeroed();
        chld_act.sa_sigaction = crate::reaper::sigchld_handler as usize;
        chld_act.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut chld_act.sa_mask);
        libc::sigaddset(&mut chld_act.sa_mask, libc::SIGINT);
        libc::sigaction(libc::SIGCHLD, &chld_act, std::ptr::null_mut());

        let mut int_act: libc::sigaction = std::mem::zeroed();
        int_act.sa_sigaction = noop_handler as usize;
        int_act.sa_flags = 0;
        libc::sigemptyset(&mut int_act.sa_mask);
        libc::sigaction(libc::SIGINT, &int_act, std::ptr::null_mut());

        libc::signal(libc::SIGTSTP, libc::SIG_IGN);
        libc::signal(libc::SIGTTIN, libc::SIG_IGN);
        libc::signal(libc::SIGTTOU, libc::SIG_IGN);
    }
}

extern "C" fn noop_handler(_sig: libc::c_int) {}

/// ブロック済みクリティカルセクションの RAII ガード。
///
/// [`enter_blocked`] で作ると同時に SIGCHLD がブロックされ、直前のマスクが
/// `prior` に保存される。ガードが drop される（スコープを抜ける、あるいは
/// パニックで巻き戻る）と、保存しておいたマスクへ必ず復元される。
pub struct BlockedRegion {
    prior: libc::sigset_t,
}

impl BlockedRegion {
    fn enter(set: &libc::sigset_t) -> Self {
        let mut prior: libc::sigset_t = unsafe { std::mem::zeroed() };
        unsafe {
            libc::sigprocmask(libc::SIG_BLOCK, set, &mut prior);
        }
        Self { prior }
    }

    /// `prior`（このリージョンに入る前のマスク）を一時的にインストールして
    /// シグナル到着まで待機し、戻ってきたら元のブロックマスクに復元する。
    /// これにより区間内では常に SIGCHLD がブロックされ続け、待機中だけ
    /// 一瞬だけ配送を許す。
    pub fn suspend(&self) {
        unsafe {
            libc::sigsuspend(&self.prior);
        }
    }

    /// フォーク直後の子プロセス側で呼ぶ: 継承されたマスクを、このリージョンに
    /// 入る前のマスクへ戻す（= SIGCHLD のブロックを解除する）。`self` を
    /// 消費しない — 子はこの後 `exec`/`_exit` するだけで、このプロセス内で
    /// Drop がもう一度走っても無害だが、`&self` で十分なので所有権は取らない。
    pub fn restore_in_child(&self) {
        unsafe {
            libc::sigprocmask(libc::SIG_SETMASK, &self.prior, std::ptr::null_mut());
        }
    }
}

impl Drop for BlockedRegion {
    fn drop(&mut self) {
        unsafe {
            libc::sigprocmask(libc::SIG_SETMASK, &self.prior, std::ptr::null_mut());
        }
    }
}

/// SIGCHLD をブロックしたクリティカルセクションに入る。戻り値を drop すると
/// 元のマスクに復元される。
pub fn enter_blocked() -> BlockedRegion {
    BlockedRegion::enter(&chld_set())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_region_restores_mask_on_drop() {
        let before: libc::sigset_t = unsafe {
            let mut s = std::mem::zeroed();
            libc::sigprocmask(libc::SIG_SETMASK, std::ptr::null(), &mut s);
            s
        };
        {
            let _region = enter_blocked();
            let mut now: libc::sigset_t = unsafe { std::mem::zeroed() };
            unsafe { libc::sigprocmask(libc::SIG_SETMASK, std::ptr::null(), &mut now) };
            assert_eq!(unsafe { libc::sigismember(&now, libc::SIGCHLD) }, 1);
        }
        let mut after: libc::sigset_t = unsafe { std::mem::zeroed() };
        unsafe { libc::sigprocmask(libc::SIG_SETMASK, std::ptr::null(), &mut after) };
        assert_eq!(
            unsafe { libc::sigismember(&before, libc::SIGCHLD) },
            unsafe { libc::sigismember(&after, libc::SIGCHLD) }
        );
    }
}
