mod support;

use std::collections::HashSet;

use memoria::application::posts::{CreatePostCommand, CurrentUser};
use memoria::domain::media::MediaSet;
use metrics_util::debugging::DebuggingRecorder;
use uuid::Uuid;

use support::{failing_jpeg, harness, jpeg};

#[tokio::test]
async fn submissions_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let h = harness();
    let user = CurrentUser::new(Uuid::new_v4());

    let mut media = MediaSet::new();
    media.add_files(vec![jpeg("a.jpg")]).expect("accepted");
    media.update_note(0, "a").expect("note");
    h.service
        .create(
            &user,
            CreatePostCommand {
                title: "Works".into(),
                media,
            },
        )
        .await
        .expect("created");

    let mut media = MediaSet::new();
    media.add_files(vec![failing_jpeg("b.jpg")]).expect("accepted");
    media.update_note(0, "b").expect("note");
    h.service
        .create(
            &user,
            CreatePostCommand {
                title: "Fails".into(),
                media,
            },
        )
        .await
        .expect_err("upload fails");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "memoria_post_submissions_total",
        "memoria_post_submit_duration_ms",
        "memoria_media_uploads_total",
    ] {
        assert!(names.contains(expected), "missing {expected}: {names:?}");
    }
}
