// ==========================================
// 生产追踪流程测试
// ==========================================
// 测试范围:
// 1. 生产单位创建与订单内序号分配
// 2. 工段只能沿流程逐段推进（不可跳段/回退）
// 3. 二级料流程的金属探测插段
// 4. 包装重量差额扣减订单剩余目标
// 5. 机台生产履历的 Upsert 口径
// ==========================================

mod test_helpers;

use plastic_tracking::api::{
    ApiError, HangerCreateRequest, HangerUpdateRequest, RollCreateRequest, RollUpdateRequest,
};
use plastic_tracking::domain::types::{MachineType, ProductFamily, Stage};
use test_helpers::{bind_machine, insert_order, reload_order, setup};

/// 吹膜 -> 创建生产卷, 序号连续递增
#[test]
fn test_create_roll_assigns_sequential_indexes() {
    let (_tmp, state) = setup();
    let order = insert_order(&state, ProductFamily::AB, None, Some("1st Degree"), 100.0, 105.0);
    let blower = bind_machine(&state, MachineType::BlowingFilm, order.id);

    let req = RollCreateRequest {
        weight_g: 20_000,
        waste_of_blowing_g: Some(150),
        blowing_machine_id: blower.machine_id.clone(),
    };
    let first = state.tracking_api.create_roll(order.id, &req).expect("创建生产卷失败");
    let second = state.tracking_api.create_roll(order.id, &req).expect("创建生产卷失败");

    assert_eq!(first.tmp_index, 1);
    assert_eq!(second.tmp_index, 2);
    assert_eq!(first.stage, Stage::Blowing);
    assert_eq!(first.roll_weight_g, Some(20_000));
    assert!(first.roll_weight_ts.is_some());
    assert_eq!(first.waste_of_blowing_g, Some(150));
    assert_eq!(first.blowing_machine_id.as_deref(), Some(blower.machine_id.as_str()));

    // 创建即写入机台生产履历
    let history = state.history_repo.list_for_order(order.id).expect("查询履历失败");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.stage == Stage::Blowing));
}

/// 工段跳段被拒绝, 逐段推进被接受
#[test]
fn test_roll_stage_must_progress_sequentially() {
    let (_tmp, state) = setup();
    let order = insert_order(&state, ProductFamily::AB, None, Some("1st Degree"), 100.0, 105.0);
    let blower = bind_machine(&state, MachineType::BlowingFilm, order.id);

    let roll = state
        .tracking_api
        .create_roll(
            order.id,
            &RollCreateRequest {
                weight_g: 20_000,
                waste_of_blowing_g: None,
                blowing_machine_id: blower.machine_id.clone(),
            },
        )
        .expect("创建生产卷失败");

    // 吹膜 -> 裁切: 跳过了印刷
    let skip = state.tracking_api.update_roll(
        order.id,
        roll.id,
        &RollUpdateRequest {
            stage: Some(Stage::Cutting),
            weight_g: Some(19_000),
            ..Default::default()
        },
    );
    assert!(matches!(
        skip,
        Err(ApiError::InvalidTransition { from: Stage::Blowing, to: Stage::Cutting })
    ));
    // 被拒绝的推进不落任何状态
    let unchanged = state.unit_repo.find_roll(order.id, roll.id).unwrap().unwrap();
    assert_eq!(unchanged.stage, Stage::Blowing);
    assert_eq!(unchanged.cut_weight_g, None);

    // 吹膜 -> 印刷: 合法后继
    let updated = state
        .tracking_api
        .update_roll(
            order.id,
            roll.id,
            &RollUpdateRequest {
                stage: Some(Stage::Printing),
                weight_g: Some(19_500),
                ..Default::default()
            },
        )
        .expect("推进到印刷失败");
    assert_eq!(updated.stage, Stage::Printing);
    assert_eq!(updated.printed_weight_g, Some(19_500));
    assert!(updated.printed_weight_ts.is_some());
}

/// 工段不可回退
#[test]
fn test_roll_stage_regression_rejected() {
    let (_tmp, state) = setup();
    let order = insert_order(&state, ProductFamily::AB, None, Some("1st Degree"), 100.0, 105.0);
    let blower = bind_machine(&state, MachineType::BlowingFilm, order.id);

    let roll = state
        .tracking_api
        .create_roll(
            order.id,
            &RollCreateRequest {
                weight_g: 20_000,
                waste_of_blowing_g: None,
                blowing_machine_id: blower.machine_id.clone(),
            },
        )
        .expect("创建生产卷失败");
    state
        .tracking_api
        .update_roll(
            order.id,
            roll.id,
            &RollUpdateRequest {
                stage: Some(Stage::Printing),
                weight_g: Some(19_500),
                ..Default::default()
            },
        )
        .expect("推进到印刷失败");

    let back = state.tracking_api.update_roll(
        order.id,
        roll.id,
        &RollUpdateRequest {
            stage: Some(Stage::Blowing),
            ..Default::default()
        },
    );
    assert!(matches!(back, Err(ApiError::InvalidTransition { .. })));
}

/// 原地更新（不换工段）恒合法: 补录损耗不受顺序约束
#[test]
fn test_same_stage_update_always_allowed() {
    let (_tmp, state) = setup();
    let order = insert_order(&state, ProductFamily::AB, None, Some("1st Degree"), 100.0, 105.0);
    let blower = bind_machine(&state, MachineType::BlowingFilm, order.id);

    let roll = state
        .tracking_api
        .create_roll(
            order.id,
            &RollCreateRequest {
                weight_g: 20_000,
                waste_of_blowing_g: None,
                blowing_machine_id: blower.machine_id.clone(),
            },
        )
        .expect("创建生产卷失败");

    let updated = state
        .tracking_api
        .update_roll(
            order.id,
            roll.id,
            &RollUpdateRequest {
                waste_of_blowing_g: Some(300),
                ..Default::default()
            },
        )
        .expect("补录损耗失败");
    assert_eq!(updated.stage, Stage::Blowing);
    assert_eq!(updated.waste_of_blowing_g, Some(300));
    assert!(updated.waste_of_blowing_ts.is_some());
}

/// 二级料: 裁切后必须过金属探测才能包装
#[test]
fn test_second_degree_flow_requires_metal_detect() {
    let (_tmp, state) = setup();
    let order = insert_order(&state, ProductFamily::AB, None, Some("2nd Degree"), 100.0, 105.0);
    let blower = bind_machine(&state, MachineType::BlowingFilm, order.id);
    let detector = bind_machine(&state, MachineType::MetalDetector, order.id);

    let roll = state
        .tracking_api
        .create_roll(
            order.id,
            &RollCreateRequest {
                weight_g: 20_000,
                waste_of_blowing_g: None,
                blowing_machine_id: blower.machine_id.clone(),
            },
        )
        .expect("创建生产卷失败");

    for (stage, weight) in [(Stage::Printing, 19_500), (Stage::Cutting, 19_000)] {
        state
            .tracking_api
            .update_roll(
                order.id,
                roll.id,
                &RollUpdateRequest {
                    stage: Some(stage),
                    weight_g: Some(weight),
                    ..Default::default()
                },
            )
            .expect("推进失败");
    }

    // 裁切 -> 包装: 二级料必须先金属探测
    let skip = state.tracking_api.update_roll(
        order.id,
        roll.id,
        &RollUpdateRequest {
            stage: Some(Stage::Packaging),
            weight_g: Some(18_500),
            ..Default::default()
        },
    );
    assert!(matches!(skip, Err(ApiError::InvalidTransition { .. })));

    let detected = state
        .tracking_api
        .update_roll(
            order.id,
            roll.id,
            &RollUpdateRequest {
                stage: Some(Stage::MetalDetect),
                metal_detect_machine_id: Some(detector.machine_id.clone()),
                waste_of_metal_detect_g: Some(80),
                ..Default::default()
            },
        )
        .expect("金属探测失败");
    assert_eq!(detected.stage, Stage::MetalDetect);
    assert!(detected.metal_detect_ts.is_some());
    assert_eq!(
        detected.metal_detect_machine_id.as_deref(),
        Some(detector.machine_id.as_str())
    );

    let packaged = state
        .tracking_api
        .update_roll(
            order.id,
            roll.id,
            &RollUpdateRequest {
                stage: Some(Stage::Packaging),
                weight_g: Some(18_500),
                ..Default::default()
            },
        )
        .expect("包装失败");
    assert_eq!(packaged.stage, Stage::Packaging);
    assert_eq!(packaged.packaged_weight_g, Some(18_500));
}

/// 包装重量按差额扣减订单剩余目标, 复称取差值
#[test]
fn test_packaging_weight_decrements_remaining() {
    let (_tmp, state) = setup();
    // PR 短流程: 吹膜 -> 包装
    let order = insert_order(&state, ProductFamily::PR, None, Some("1st Degree"), 10.0, 10.5);
    let blower = bind_machine(&state, MachineType::BlowingFilm, order.id);
    assert_eq!(reload_order(&state, order.id).remaining_target_g, 10_500);

    let roll = state
        .tracking_api
        .create_roll(
            order.id,
            &RollCreateRequest {
                weight_g: 700,
                waste_of_blowing_g: None,
                blowing_machine_id: blower.machine_id.clone(),
            },
        )
        .expect("创建生产卷失败");

    state
        .tracking_api
        .update_roll(
            order.id,
            roll.id,
            &RollUpdateRequest {
                stage: Some(Stage::Packaging),
                weight_g: Some(600),
                ..Default::default()
            },
        )
        .expect("包装失败");
    assert_eq!(reload_order(&state, order.id).remaining_target_g, 9_900);

    // 复称 650g: 差额只扣 50
    state
        .tracking_api
        .update_roll(
            order.id,
            roll.id,
            &RollUpdateRequest {
                weight_g: Some(650),
                ..Default::default()
            },
        )
        .expect("复称失败");
    assert_eq!(reload_order(&state, order.id).remaining_target_g, 9_850);

    // 复称回落 600g: 差额为负, 剩余目标回升
    state
        .tracking_api
        .update_roll(
            order.id,
            roll.id,
            &RollUpdateRequest {
                weight_g: Some(600),
                ..Default::default()
            },
        )
        .expect("复称失败");
    assert_eq!(reload_order(&state, order.id).remaining_target_g, 9_900);
}

/// 负数重量/损耗被验证拦截
#[test]
fn test_validation_rejects_bad_numbers() {
    let (_tmp, state) = setup();
    let order = insert_order(&state, ProductFamily::AB, None, Some("1st Degree"), 100.0, 105.0);
    let blower = bind_machine(&state, MachineType::BlowingFilm, order.id);

    let zero_weight = state.tracking_api.create_roll(
        order.id,
        &RollCreateRequest {
            weight_g: 0,
            waste_of_blowing_g: None,
            blowing_machine_id: blower.machine_id.clone(),
        },
    );
    assert!(matches!(zero_weight, Err(ApiError::ValidationError(_))));

    let negative_waste = state.tracking_api.create_roll(
        order.id,
        &RollCreateRequest {
            weight_g: 1000,
            waste_of_blowing_g: Some(-5),
            blowing_machine_id: blower.machine_id.clone(),
        },
    );
    assert!(matches!(negative_waste, Err(ApiError::ValidationError(_))));

    // 验证失败不落库
    assert!(state.unit_repo.list_rolls(order.id).unwrap().is_empty());
}

/// 产品族不匹配的操作被拒绝
#[test]
fn test_wrong_family_rejected() {
    let (_tmp, state) = setup();
    let ph_order = insert_order(
        &state,
        ProductFamily::PH,
        Some("Classic-30"),
        Some("1st Degree"),
        50.0,
        52.0,
    );
    let injector = bind_machine(&state, MachineType::InjectionMolding, ph_order.id);

    let as_roll = state.tracking_api.create_roll(
        ph_order.id,
        &RollCreateRequest {
            weight_g: 1000,
            waste_of_blowing_g: None,
            blowing_machine_id: injector.machine_id.clone(),
        },
    );
    assert!(matches!(as_roll, Err(ApiError::InvalidInput(_))));

    // 订单不存在
    let missing = state.tracking_api.create_hanger_batch(
        9999,
        &HangerCreateRequest {
            weight_g: 1000,
            waste_of_im_g: None,
            injection_machine_id: injector.machine_id.clone(),
        },
    );
    assert!(matches!(missing, Err(ApiError::NotFound(_))));
}

/// WT-19 轻量型号: 注塑 -> 称重 -> 分规 -> 包装, 整体跳过装夹
#[test]
fn test_hanger_wt19_flow() {
    let (_tmp, state) = setup();
    let order = insert_order(
        &state,
        ProductFamily::PH,
        Some("WT-19"),
        Some("1st Degree"),
        10.0,
        10.4,
    );
    let injector = bind_machine(&state, MachineType::InjectionMolding, order.id);

    let batch = state
        .tracking_api
        .create_hanger_batch(
            order.id,
            &HangerCreateRequest {
                weight_g: 5_000,
                waste_of_im_g: Some(120),
                injection_machine_id: injector.machine_id.clone(),
            },
        )
        .expect("创建注塑批次失败");
    assert_eq!(batch.batch_index, 1);
    assert_eq!(batch.stage, Stage::Injection);
    assert_eq!(batch.model.as_deref(), Some("WT-19"));
    assert_eq!(batch.waste_of_im_g, Some(120));

    // WT-19 的流程里没有装夹工段
    let clip = state.tracking_api.update_hanger_batch(
        order.id,
        batch.id,
        &HangerUpdateRequest {
            stage: Some(Stage::PlasticClips),
            ..Default::default()
        },
    );
    assert!(matches!(clip, Err(ApiError::InvalidTransition { .. })));

    for stage in [Stage::Weighing, Stage::Sizing] {
        state
            .tracking_api
            .update_hanger_batch(
                order.id,
                batch.id,
                &HangerUpdateRequest {
                    stage: Some(stage),
                    ..Default::default()
                },
            )
            .expect("推进失败");
    }

    let packaged = state
        .tracking_api
        .update_hanger_batch(
            order.id,
            batch.id,
            &HangerUpdateRequest {
                stage: Some(Stage::Packaging),
                weight_g: Some(4_800),
                ..Default::default()
            },
        )
        .expect("包装失败");
    assert_eq!(packaged.stage, Stage::Packaging);
    assert_eq!(packaged.packaged_weight_g, Some(4_800));
    assert!(packaged.sizing_ts.is_some());
    assert_eq!(reload_order(&state, order.id).remaining_target_g, 10_400 - 4_800);
}

/// 普通衣架型号: 分规后必须过两道装夹
#[test]
fn test_hanger_clip_stages_required_for_other_models() {
    let (_tmp, state) = setup();
    let order = insert_order(
        &state,
        ProductFamily::PH,
        Some("Classic-30"),
        Some("2nd Degree"),
        50.0,
        52.0,
    );
    let injector = bind_machine(&state, MachineType::InjectionMolding, order.id);
    let detector = bind_machine(&state, MachineType::MetalDetector, order.id);

    let batch = state
        .tracking_api
        .create_hanger_batch(
            order.id,
            &HangerCreateRequest {
                weight_g: 5_000,
                waste_of_im_g: None,
                injection_machine_id: injector.machine_id.clone(),
            },
        )
        .expect("创建注塑批次失败");

    state
        .tracking_api
        .update_hanger_batch(
            order.id,
            batch.id,
            &HangerUpdateRequest {
                stage: Some(Stage::Weighing),
                ..Default::default()
            },
        )
        .expect("称重失败");

    // 二级料: 称重后先金属探测
    let detected = state
        .tracking_api
        .update_hanger_batch(
            order.id,
            batch.id,
            &HangerUpdateRequest {
                stage: Some(Stage::MetalDetect),
                metal_detect_machine_id: Some(detector.machine_id.clone()),
                ..Default::default()
            },
        )
        .expect("金属探测失败");
    assert!(detected.metal_detect_ts.is_some());

    state
        .tracking_api
        .update_hanger_batch(
            order.id,
            batch.id,
            &HangerUpdateRequest {
                stage: Some(Stage::Sizing),
                ..Default::default()
            },
        )
        .expect("分规失败");

    // 分规 -> 包装: 还差两道装夹
    let skip = state.tracking_api.update_hanger_batch(
        order.id,
        batch.id,
        &HangerUpdateRequest {
            stage: Some(Stage::Packaging),
            weight_g: Some(4_800),
            ..Default::default()
        },
    );
    assert!(matches!(skip, Err(ApiError::InvalidTransition { .. })));

    for stage in [Stage::PlasticClips, Stage::MetalClips] {
        state
            .tracking_api
            .update_hanger_batch(
                order.id,
                batch.id,
                &HangerUpdateRequest {
                    stage: Some(stage),
                    ..Default::default()
                },
            )
            .expect("装夹失败");
    }

    // 包装时补录金属探测损耗（探测剔除件在终检称量）
    let packaged = state
        .tracking_api
        .update_hanger_batch(
            order.id,
            batch.id,
            &HangerUpdateRequest {
                stage: Some(Stage::Packaging),
                weight_g: Some(4_800),
                waste_of_metaldetect_g: Some(60),
                ..Default::default()
            },
        )
        .expect("包装失败");
    assert_eq!(packaged.waste_of_metaldetect_g, Some(60));
    assert!(packaged.plastic_clips_ts.is_some());
    assert!(packaged.metal_clips_ts.is_some());
}

/// 履历按 (机台, 订单, 序号, 工段) Upsert, 重复记录只覆盖
#[test]
fn test_history_upsert_overwrites() {
    let (_tmp, state) = setup();
    let order = insert_order(&state, ProductFamily::AB, None, Some("1st Degree"), 100.0, 105.0);
    let blower = bind_machine(&state, MachineType::BlowingFilm, order.id);
    let printer = bind_machine(&state, MachineType::Printing, order.id);

    let roll = state
        .tracking_api
        .create_roll(
            order.id,
            &RollCreateRequest {
                weight_g: 20_000,
                waste_of_blowing_g: None,
                blowing_machine_id: blower.machine_id.clone(),
            },
        )
        .expect("创建生产卷失败");

    state
        .tracking_api
        .update_roll(
            order.id,
            roll.id,
            &RollUpdateRequest {
                stage: Some(Stage::Printing),
                weight_g: Some(19_500),
                printing_machine_id: Some(printer.machine_id.clone()),
                ..Default::default()
            },
        )
        .expect("推进到印刷失败");

    // 同工段复称: 履历覆盖而非新增
    state
        .tracking_api
        .update_roll(
            order.id,
            roll.id,
            &RollUpdateRequest {
                weight_g: Some(19_200),
                printing_machine_id: Some(printer.machine_id.clone()),
                ..Default::default()
            },
        )
        .expect("复称失败");

    let history = state.history_repo.list_for_order(order.id).expect("查询履历失败");
    let printing: Vec<_> = history.iter().filter(|h| h.stage == Stage::Printing).collect();
    assert_eq!(printing.len(), 1);
    assert_eq!(printing[0].production_weight_g, 19_200);
}

/// 统一单位视图与订单流程标注
#[test]
fn test_list_units_and_order_flow() {
    let (_tmp, state) = setup();
    let order = insert_order(&state, ProductFamily::AB, None, Some("2nd Degree"), 100.0, 105.0);
    let blower = bind_machine(&state, MachineType::BlowingFilm, order.id);

    state
        .tracking_api
        .create_roll(
            order.id,
            &RollCreateRequest {
                weight_g: 20_000,
                waste_of_blowing_g: None,
                blowing_machine_id: blower.machine_id.clone(),
            },
        )
        .expect("创建生产卷失败");

    let units = state.tracking_api.list_units(order.id).expect("查询单位失败");
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].sequence_index(), 1);
    assert_eq!(units[0].current_stage(), Stage::Blowing);
    assert_eq!(units[0].packaged_weight_g(), None);

    let flow = state.tracking_api.order_flow(order.id).expect("查询流程失败");
    let stages: Vec<Stage> = flow.iter().map(|info| info.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Blowing,
            Stage::Printing,
            Stage::Cutting,
            Stage::MetalDetect,
            Stage::Packaging
        ]
    );
    assert!(flow[0].requires_machine);
    assert_eq!(flow[0].machine_type, Some(MachineType::BlowingFilm));
    // 包装不需要机台
    assert!(!flow[4].requires_machine);
    assert_eq!(flow[4].machine_type, None);
}
