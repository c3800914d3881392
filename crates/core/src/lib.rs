pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
    pub mod onnx_session;
    pub mod region;
}

pub mod config {
    pub mod profile;
    pub mod profile_source;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod recognition {
    pub mod domain {
        pub mod face_analyzer;
        pub mod feature;
        pub mod feature_source;
        pub mod feature_store;
        pub mod match_notifier;
        pub mod similarity_matcher;
    }
    pub mod infrastructure;
    pub mod feature_refresher;
}

pub mod tracking {
    pub mod domain {
        pub mod face_track;
        pub mod frame_annotator;
        pub mod frame_rate;
        pub mod task_lane;
        pub mod track_set;
    }
    pub mod infrastructure {
        pub mod overlay_annotator;
    }
    pub mod enrichment_service;
    pub mod tracker_loop;
}

pub mod enrollment {
    pub mod enroll_face_use_case;
}

pub mod video {
    pub mod domain {
        pub mod frame_broadcaster;
        pub mod frame_source;
        pub mod image_writer;
    }
    pub mod infrastructure {
        pub mod channel_broadcaster;
        pub mod ffmpeg_frame_source;
        pub mod image_file_loader;
        pub mod image_file_writer;
    }
}
