//! フォアグラウンドモニタ: フォアグラウンドジョブが RUNNING でなくなるまで
//! ブロックする。§4.6。

use crate::job::JobState;
use crate::shell::Shell;
use crate::signals::BlockedRegion;

const FG: usize = 0;

/// フォアグラウンドジョブが実行状態を離れるまで待ち、終了コードを返す。
///
/// 呼び出し時点で SIGCHLD がブロックされた区間の中にいること（`region` は
/// その区間を表す）。ジョブが STOPPED で抜けた場合は 0 を返す — ジョブは
/// バックグラウンドスロットへ生き残る。
pub fn wait_for_fg(shell: &mut Shell, region: &BlockedRegion) -> i32 {
    let code = loop {
        let (state, exit) = shell.jobs.job_state(FG);
        match state {
            JobState::Running => {
                region.suspend();
            }
            JobState::Stopped => {
                let bg_slot = shell.jobs.alloc_job();
                shell.jobs.move_job(FG, bg_slot);
                let tmodes = shell.terminal.save_attrs();
                shell.jobs.set_tmodes(bg_slot, tmodes);
                break 0;
            }
            JobState::Finished => {
                break exit
                    .expect("job_state must report exit status when FINISHED")
                    .code();
            }
        }
    };

    shell.terminal.set_fg_pgrp(shell.shell_pgid);
    shell.terminal.restore_attrs(&shell.terminal.shell_tmodes());
    code
}
