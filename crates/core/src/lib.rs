//! QR attendance check-in: a debounced decode loop over a live frame feed,
//! plus the record store and reporting around it.

pub mod shared {
    pub mod clock;
    pub mod constants;
    pub mod frame;
}

pub mod capture {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure {
        pub mod image_sequence_source;
    }
}

pub mod decoding {
    pub mod domain {
        pub mod code_decoder;
    }
    pub mod infrastructure {
        pub mod qr_decoder;
    }
}

pub mod scanning {
    pub mod domain {
        pub mod scan_policy;
        pub mod scanner_config;
    }
    pub mod scan_controller;
}

pub mod attendance {
    pub mod domain {
        pub mod attendance_record;
        pub mod record_store;
        pub mod session;
    }
    pub mod infrastructure {
        pub mod json_file_record_store;
        pub mod memory_record_store;
        pub mod rest_record_store;
    }
}

pub mod pipeline {
    pub mod check_in_use_case;
    pub mod export_attendance_use_case;
    pub mod statistics_use_case;
}
